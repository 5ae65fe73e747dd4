//! RegisterItem - versioned metadata wrapper for a registered entity

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::status::Status;
use crate::graph::{vocab, EntityGraph};

/// Where an item's entity payload lives
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityBody {
    /// Payload stored with the item version
    Owned(EntityGraph),
    /// The entity is a register with its own version chain
    Register,
    /// The entity belongs to another item; resolved through the entity index
    Reference,
}

/// One version of a register item.
///
/// `entity` is only populated when the caller asked for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisterItem {
    pub uri: String,
    pub notation: String,
    /// Parent register URI
    pub register: String,
    pub status: Status,
    pub version: u64,
    pub submitted: DateTime<Utc>,
    pub accepted: Option<DateTime<Utc>>,
    pub modified: DateTime<Utc>,
    /// Item-level descriptive statements (label, description, provenance)
    pub metadata: EntityGraph,
    pub entity_uri: String,
    /// Types the entity declared when this version was written
    pub item_class: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityGraph>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, EntityGraph>,
}

impl RegisterItem {
    pub fn label(&self) -> Option<&str> {
        self.metadata.label()
    }

    /// The entity is itself a register
    pub fn is_register(&self) -> bool {
        self.item_class.iter().any(|t| t == vocab::REG_REGISTER)
    }

    /// Entity identity is fixed once the item has been accepted
    pub fn identity_fixed(&self) -> bool {
        self.accepted.is_some()
    }

    pub fn is_live(&self) -> bool {
        self.status != Status::Invalid
    }

    /// Item metadata rendered as a graph, including store-managed properties
    pub fn describe(&self) -> EntityGraph {
        use crate::graph::Value;

        let mut g = self.metadata.clone();
        g.set_uri(self.uri.clone());
        g.add(vocab::RDF_TYPE, Value::uri(vocab::REG_REGISTER_ITEM));
        g.set(vocab::REG_PARENT, Value::uri(self.register.clone()));
        g.set(vocab::REG_NOTATION, Value::text(self.notation.clone()));
        g.set(
            vocab::REG_STATUS,
            Value::uri(format!("{}status{}", vocab::REG, capitalize(self.status.as_str()))),
        );
        g.set(vocab::OWL_VERSION_INFO, Value::integer(self.version as i64));
        g.set(vocab::DCT_DATE_SUBMITTED, Value::text(self.submitted.to_rfc3339()));
        g.set(vocab::DCT_MODIFIED, Value::text(self.modified.to_rfc3339()));
        if let Some(accepted) = self.accepted {
            g.set(vocab::DCT_DATE_ACCEPTED, Value::text(accepted.to_rfc3339()));
        }
        for class in &self.item_class {
            g.add(vocab::REG_ITEM_CLASS, Value::uri(class.clone()));
        }
        g
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item() -> RegisterItem {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        RegisterItem {
            uri: "http://example.com/reg1/_red".into(),
            notation: "red".into(),
            register: "http://example.com/reg1".into(),
            status: Status::Stable,
            version: 2,
            submitted: t,
            accepted: Some(t),
            modified: t,
            metadata: EntityGraph::new("http://example.com/reg1/_red").labelled("red"),
            entity_uri: "http://example.com/reg1/red".into(),
            item_class: vec!["http://www.w3.org/2004/02/skos/core#Concept".into()],
            entity: None,
            annotations: BTreeMap::new(),
        }
    }

    #[test]
    fn test_describe_adds_managed_properties() {
        let g = item().describe();
        assert!(g.has_type(vocab::REG_REGISTER_ITEM));
        assert_eq!(g.text(vocab::REG_NOTATION), Some("red"));
        assert_eq!(
            g.first(vocab::REG_STATUS).and_then(|v| v.as_uri()),
            Some("http://purl.org/linked-data/registry#statusStable")
        );
        assert!(g.has_property(vocab::DCT_DATE_ACCEPTED));
        assert_eq!(g.label(), Some("red"));
    }

    #[test]
    fn test_flags() {
        let i = item();
        assert!(i.identity_fixed());
        assert!(i.is_live());
        assert!(!i.is_register());
    }
}
