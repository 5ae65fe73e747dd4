//! Register - a container of items, itself the entity of an item

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::status::Status;
use crate::graph::{vocab, EntityGraph, Value};
use crate::validation::Constraint;

/// One version of a register
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Register {
    pub uri: String,
    /// Item describing this register in its parent; `None` for the root
    pub item_uri: Option<String>,
    pub description: EntityGraph,
    /// Type every member entity must declare
    pub contained_item_class: Option<String>,
    pub constraints: Vec<Constraint>,
    /// Notation -> item URI, for every notation ever registered here
    pub members: BTreeMap<String, String>,
    pub version: u64,
}

impl Register {
    pub fn new(uri: impl Into<String>, description: EntityGraph) -> Self {
        let contained_item_class = description
            .first(vocab::REG_CONTAINED_ITEM_CLASS)
            .and_then(|v| v.as_uri())
            .map(str::to_string);
        Self {
            uri: uri.into(),
            item_uri: None,
            description,
            contained_item_class,
            constraints: Vec::new(),
            members: BTreeMap::new(),
            version: 0,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.description.label()
    }

    /// URI of a child resource: `<register>/<local>`, or `<register><local>`
    /// when the register URI already ends in `/`
    pub fn child_uri(&self, local: &str) -> String {
        child_uri(&self.uri, local)
    }

    /// Item URI for a notation
    pub fn item_uri_for(&self, notation: &str) -> String {
        self.child_uri(&format!("_{}", notation))
    }

    /// Register description with one `rdfs:member` per registered entity
    pub fn describe(&self, member_entities: &[String]) -> EntityGraph {
        let mut g = self.description.clone();
        g.add(vocab::RDF_TYPE, Value::uri(vocab::REG_REGISTER));
        for entity in member_entities {
            g.add(vocab::REG_MEMBER, Value::uri(entity.clone()));
        }
        g
    }
}

pub fn child_uri(base: &str, local: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, local)
    } else {
        format!("{}/{}", base, local)
    }
}

/// Lightweight view of one register member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSummary {
    pub item_uri: String,
    pub entity_uri: String,
    pub notation: String,
    pub status: Status,
    pub label: Option<String>,
    pub types: Vec<String>,
    pub version: u64,
}

/// Order notations numerically if every one parses as a finite number,
/// otherwise lexically.
pub fn sort_notations<T>(entries: &mut [(String, T)]) {
    let numeric: Option<Vec<f64>> = entries.iter().map(|(n, _)| parse_number(n)).collect();
    if numeric.is_some() {
        entries.sort_by(|(a, _), (b, _)| {
            let (x, y) = (parse_number(a).unwrap_or(0.0), parse_number(b).unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal).then_with(|| a.cmp(b))
        });
    } else {
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_uris() {
        let root = Register::new("http://example.com/", EntityGraph::new("http://example.com/"));
        assert_eq!(root.item_uri_for("reg1"), "http://example.com/_reg1");
        assert_eq!(root.child_uri("reg1"), "http://example.com/reg1");

        let reg1 = Register::new("http://example.com/reg1", EntityGraph::new("x"));
        assert_eq!(reg1.item_uri_for("red"), "http://example.com/reg1/_red");
    }

    #[test]
    fn test_contained_item_class_from_description() {
        let d = EntityGraph::new("http://example.com/reg1").with(
            vocab::REG_CONTAINED_ITEM_CLASS,
            Value::uri("http://www.w3.org/2004/02/skos/core#Concept"),
        );
        let r = Register::new("http://example.com/reg1", d);
        assert_eq!(
            r.contained_item_class.as_deref(),
            Some("http://www.w3.org/2004/02/skos/core#Concept")
        );
    }

    #[test]
    fn test_numeric_ordering() {
        let mut entries: Vec<(String, ())> =
            ["15", "8", "9", "7"].iter().map(|s| (s.to_string(), ())).collect();
        sort_notations(&mut entries);
        let order: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(order, vec!["7", "8", "9", "15"]);
    }

    #[test]
    fn test_lexical_ordering_when_mixed() {
        let mut entries: Vec<(String, ())> =
            ["15", "red", "8"].iter().map(|s| (s.to_string(), ())).collect();
        sort_notations(&mut entries);
        let order: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(order, vec!["15", "8", "red"]);
    }
}
