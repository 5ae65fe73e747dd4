//! Snapshots held in the store's version chains

use crate::graph::EntityGraph;
use crate::registry::{EntityBody, RegisterItem};

/// One version of an item as stored.
///
/// `item.entity` is always `None` here; the payload lives in `body` and is
/// only materialized on read.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub item: RegisterItem,
    pub body: EntityBody,
}

impl ItemRecord {
    pub fn new(mut item: RegisterItem, body: EntityBody) -> Self {
        item.entity = None;
        Self { item, body }
    }

    pub fn uri(&self) -> &str {
        &self.item.uri
    }

    pub fn version(&self) -> u64 {
        self.item.version
    }

    /// Payload stored with this version, if the item owns one
    pub fn owned_entity(&self) -> Option<&EntityGraph> {
        match &self.body {
            EntityBody::Owned(g) => Some(g),
            EntityBody::Register | EntityBody::Reference => None,
        }
    }

    /// Copy for the next version, numbered one past this one
    pub fn successor(&self) -> ItemRecord {
        let mut next = self.clone();
        next.item.version += 1;
        next
    }
}
