//! Entity graph data types
//!
//! An entity graph is a schema-less property bag identified by a URI.
//! Each property maps to one or more values; a value is a literal, a
//! reference to another resource, or a nested (anonymous) graph.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::vocab;

/// A literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Coarse classification of a value, used by constraint checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Text,
    Integer,
    Float,
    Boolean,
    Uri,
    Graph,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
            ValueKind::Uri => "uri",
            ValueKind::Graph => "graph",
        }
    }
}

/// The object of a property statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    Literal(Literal),
    Uri(String),
    Graph(Box<EntityGraph>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Literal(Literal::Text(s.into()))
    }

    pub fn integer(i: i64) -> Self {
        Value::Literal(Literal::Integer(i))
    }

    pub fn uri(s: impl Into<String>) -> Self {
        Value::Uri(s.into())
    }

    pub fn graph(g: EntityGraph) -> Self {
        Value::Graph(Box::new(g))
    }

    pub fn as_uri(&self) -> Option<&str> {
        match self {
            Value::Uri(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Literal(Literal::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Literal(Literal::Text(_)) => ValueKind::Text,
            Value::Literal(Literal::Integer(_)) => ValueKind::Integer,
            Value::Literal(Literal::Float(_)) => ValueKind::Float,
            Value::Literal(Literal::Boolean(_)) => ValueKind::Boolean,
            Value::Uri(_) => ValueKind::Uri,
            Value::Graph(_) => ValueKind::Graph,
        }
    }
}

/// A resource's payload: URI plus property statements.
///
/// Once committed to a version chain a graph is never mutated; updates
/// build a new graph and append it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityGraph {
    uri: String,
    #[serde(default)]
    properties: BTreeMap<String, Vec<Value>>,
}

impl EntityGraph {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            properties: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Rebind the graph to a different identity
    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = uri.into();
    }

    /// Builder form of [`EntityGraph::add`]
    pub fn with(mut self, property: impl Into<String>, value: Value) -> Self {
        self.add(property, value);
        self
    }

    /// Builder shortcut for a label
    pub fn labelled(self, label: impl Into<String>) -> Self {
        self.with(vocab::RDFS_LABEL, Value::text(label))
    }

    /// Builder shortcut for a type declaration
    pub fn typed(self, type_uri: impl Into<String>) -> Self {
        self.with(vocab::RDF_TYPE, Value::uri(type_uri))
    }

    /// Add a statement. Duplicate values are ignored.
    pub fn add(&mut self, property: impl Into<String>, value: Value) {
        let values = self.properties.entry(property.into()).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    /// Replace all values of a property with a single value
    pub fn set(&mut self, property: impl Into<String>, value: Value) {
        self.properties.insert(property.into(), vec![value]);
    }

    /// Remove every value of a property, returning what was removed
    pub fn remove_all(&mut self, property: &str) -> Vec<Value> {
        self.properties.remove(property).unwrap_or_default()
    }

    /// Remove one statement. Returns true if it was present.
    pub fn remove_value(&mut self, property: &str, value: &Value) -> bool {
        let Some(values) = self.properties.get_mut(property) else {
            return false;
        };
        let before = values.len();
        values.retain(|v| v != value);
        let removed = values.len() != before;
        if values.is_empty() {
            self.properties.remove(property);
        }
        removed
    }

    pub fn values(&self, property: &str) -> &[Value] {
        self.properties
            .get(property)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn first(&self, property: &str) -> Option<&Value> {
        self.values(property).first()
    }

    /// First text literal of a property
    pub fn text(&self, property: &str) -> Option<&str> {
        self.values(property).iter().find_map(|v| v.as_text())
    }

    pub fn label(&self) -> Option<&str> {
        self.text(vocab::RDFS_LABEL)
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.properties.contains_key(property)
    }

    pub fn has_value(&self, property: &str, value: &Value) -> bool {
        self.values(property).contains(value)
    }

    /// Declared `rdf:type` URIs
    pub fn types(&self) -> Vec<&str> {
        self.values(vocab::RDF_TYPE)
            .iter()
            .filter_map(|v| v.as_uri())
            .collect()
    }

    pub fn has_type(&self, type_uri: &str) -> bool {
        self.types().contains(&type_uri)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(|k| k.as_str())
    }

    pub fn statements(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties
            .iter()
            .flat_map(|(p, vs)| vs.iter().map(move |v| (p.as_str(), v)))
    }

    /// Number of statements
    pub fn len(&self) -> usize {
        self.properties.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Overlay another graph's properties onto this one.
    ///
    /// Every property present in `other` replaces the same property here;
    /// properties absent from `other` are kept. The URI is unchanged.
    pub fn merge(&self, other: &EntityGraph) -> EntityGraph {
        let mut merged = self.clone();
        for (property, values) in &other.properties {
            merged.properties.insert(property.clone(), values.clone());
        }
        merged
    }
}
