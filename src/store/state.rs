//! In-memory store state and atomic change sets
//!
//! All chains live behind one `RwLock`. Readers hold it only long enough
//! to clone `Arc` snapshots; writers prepare a `ChangeSet` outside it and
//! apply the whole set under one write guard, so a parent/child pair
//! becomes visible together or not at all.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::records::ItemRecord;
use crate::errors::{RegistryError, RegistryResult};
use crate::graph::EntityGraph;
use crate::notify::ChangeKind;
use crate::registry::{EntityBody, Register, RegisterItem, Tag};
use crate::version::VersionChain;

#[derive(Debug, Default)]
pub(crate) struct State {
    /// Item URI -> item history
    pub items: HashMap<String, VersionChain<ItemRecord>>,
    /// Register URI -> register history
    pub registers: HashMap<String, VersionChain<Register>>,
    /// Entity URI -> owning item URI
    pub entities: HashMap<String, String>,
    /// Register URI -> tag name -> tag
    pub tags: HashMap<String, BTreeMap<String, Tag>>,
}

impl State {
    pub fn current_item(&self, uri: &str) -> RegistryResult<Arc<ItemRecord>> {
        self.items
            .get(uri)
            .ok_or_else(|| RegistryError::not_found(format!("item <{}>", uri)))?
            .current()
            .map(|v| v.snapshot())
    }

    pub fn current_register(&self, uri: &str) -> RegistryResult<Arc<Register>> {
        self.registers
            .get(uri)
            .ok_or_else(|| RegistryError::not_found(format!("register <{}>", uri)))?
            .current()
            .map(|v| v.snapshot())
    }

    /// Item URI for an item, entity or register URI
    pub fn resolve_item_uri(&self, uri: &str) -> RegistryResult<String> {
        if self.items.contains_key(uri) {
            return Ok(uri.to_string());
        }
        if let Some(item) = self.entities.get(uri) {
            return Ok(item.clone());
        }
        if self.registers.contains_key(uri) {
            return Err(RegistryError::not_found(format!(
                "<{}> is the root register and has no item",
                uri
            )));
        }
        Err(RegistryError::not_found(format!("<{}> is not registered", uri)))
    }

    /// Register URI for a register or register item URI
    pub fn resolve_register_uri(&self, uri: &str) -> RegistryResult<String> {
        if self.registers.contains_key(uri) {
            return Ok(uri.to_string());
        }
        if let Ok(record) = self.current_item(uri) {
            if matches!(record.body, EntityBody::Register) {
                return Ok(record.item.entity_uri.clone());
            }
        }
        Err(RegistryError::not_found(format!("register <{}>", uri)))
    }

    /// Item snapshot visible at `at`, or the current one
    pub fn item_at(&self, uri: &str, at: Option<DateTime<Utc>>) -> RegistryResult<Arc<ItemRecord>> {
        match at {
            None => self.current_item(uri),
            Some(t) => self
                .items
                .get(uri)
                .ok_or_else(|| RegistryError::not_found(format!("item <{}>", uri)))?
                .version_at(t)
                .map(|v| v.snapshot()),
        }
    }

    pub fn register_at(&self, uri: &str, at: Option<DateTime<Utc>>) -> RegistryResult<Arc<Register>> {
        match at {
            None => self.current_register(uri),
            Some(t) => self
                .registers
                .get(uri)
                .ok_or_else(|| RegistryError::not_found(format!("register <{}>", uri)))?
                .version_at(t)
                .map(|v| v.snapshot()),
        }
    }

    /// Entity URIs of the members of `register` that were live at `at`
    pub fn member_entities(&self, register: &Register, at: Option<DateTime<Utc>>) -> Vec<String> {
        register
            .members
            .values()
            .filter_map(|item_uri| self.item_at(item_uri, at).ok())
            .filter(|r| r.item.is_live())
            .map(|r| r.item.entity_uri.clone())
            .collect()
    }

    /// Entity payload of `record`, as of `at` for register entities
    pub fn entity_of(&self, record: &ItemRecord, at: Option<DateTime<Utc>>) -> Option<EntityGraph> {
        match &record.body {
            EntityBody::Owned(g) => Some(g.clone()),
            EntityBody::Register => {
                let register = self.register_at(&record.item.entity_uri, at).ok()?;
                Some(register.describe(&self.member_entities(&register, at)))
            }
            EntityBody::Reference => {
                let owner = self.entities.get(&record.item.entity_uri)?;
                let owner = self.item_at(owner, at).ok()?;
                match owner.body {
                    EntityBody::Reference => None,
                    _ => self.entity_of(&owner, at),
                }
            }
        }
    }

    /// Public view of a stored snapshot
    pub fn materialize(
        &self,
        record: &ItemRecord,
        with_entity: bool,
        at: Option<DateTime<Utc>>,
    ) -> RegisterItem {
        let mut item = record.item.clone();
        if with_entity {
            item.entity = self.entity_of(record, at);
        }
        item
    }

    /// Apply a change set atomically at `at`.
    ///
    /// Every append is checked before anything is written; a failed check
    /// leaves the state untouched.
    pub fn apply(&mut self, changes: ChangeSet, at: DateTime<Utc>) -> RegistryResult<Vec<(String, ChangeKind)>> {
        for record in &changes.items {
            check_next(self.items.get(record.uri()), record.uri(), record.version(), at)?;
        }
        for register in &changes.registers {
            check_next(self.registers.get(&register.uri), &register.uri, register.version, at)?;
        }
        for tag in &changes.tags {
            let taken = self
                .tags
                .get(&tag.register)
                .map_or(false, |tags| tags.contains_key(&tag.name));
            if taken {
                return Err(RegistryError::conflict(format!(
                    "tag '{}' already exists on <{}>",
                    tag.name, tag.register
                )));
            }
        }

        for record in changes.items {
            let uri = record.uri().to_string();
            self.items
                .entry(uri.clone())
                .or_insert_with(|| VersionChain::new(uri))
                .append(record, at)?;
        }
        for register in changes.registers {
            let uri = register.uri.clone();
            self.registers
                .entry(uri.clone())
                .or_insert_with(|| VersionChain::new(uri))
                .append(register, at)?;
        }
        for (entity, owner) in changes.index {
            match owner {
                Some(item) => {
                    self.entities.insert(entity, item);
                }
                None => {
                    self.entities.remove(&entity);
                }
            }
        }
        for tag in changes.tags {
            self.tags
                .entry(tag.register.clone())
                .or_default()
                .insert(tag.name.clone(), tag);
        }
        Ok(changes.events)
    }
}

/// The append must be the next version number and move forward in time
fn check_next<T>(
    chain: Option<&VersionChain<T>>,
    uri: &str,
    version: u64,
    at: DateTime<Utc>,
) -> RegistryResult<()> {
    let expected = chain.map_or(0, |c| c.len() as u64) + 1;
    if version != expected {
        return Err(RegistryError::conflict(format!(
            "version race on <{}>: prepared version {}, next is {}",
            uri, version, expected
        )));
    }
    match chain {
        Some(c) => c.check_append(at),
        None => Ok(()),
    }
}

/// Versions, index updates and tags committed together
#[derive(Debug, Default)]
pub(crate) struct ChangeSet {
    items: Vec<ItemRecord>,
    registers: Vec<Register>,
    index: Vec<(String, Option<String>)>,
    tags: Vec<Tag>,
    events: Vec<(String, ChangeKind)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(&mut self, record: ItemRecord, kind: ChangeKind) -> &mut Self {
        self.events.push((record.uri().to_string(), kind));
        self.items.push(record);
        self
    }

    pub fn register(&mut self, register: Register, kind: ChangeKind) -> &mut Self {
        self.events.push((register.uri.clone(), kind));
        self.registers.push(register);
        self
    }

    /// Point `entity` at `item`
    pub fn index(&mut self, entity: impl Into<String>, item: impl Into<String>) -> &mut Self {
        self.index.push((entity.into(), Some(item.into())));
        self
    }

    pub fn unindex(&mut self, entity: impl Into<String>) -> &mut Self {
        self.index.push((entity.into(), None));
        self
    }

    pub fn tag(&mut self, tag: Tag) -> &mut Self {
        self.events.push((tag.uri(), ChangeKind::Tagged));
        self.tags.push(tag);
        self
    }

    /// Number of version appends in this set
    pub fn version_count(&self) -> u64 {
        (self.items.len() + self.registers.len()) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.registers.is_empty() && self.tags.is_empty()
    }
}
