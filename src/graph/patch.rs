//! Additive/subtractive diffs over entity graphs

use serde::{Deserialize, Serialize};

use super::types::{EntityGraph, Value};

/// A statement removal. `value: None` removes every value of the property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Removal {
    pub property: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// A diff applied to a graph: removals first, then additions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphPatch {
    #[serde(default)]
    pub remove: Vec<Removal>,
    #[serde(default)]
    pub add: Vec<(String, Value)>,
}

impl GraphPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adding(mut self, property: impl Into<String>, value: Value) -> Self {
        self.add.push((property.into(), value));
        self
    }

    pub fn removing(mut self, property: impl Into<String>, value: Value) -> Self {
        self.remove.push(Removal {
            property: property.into(),
            value: Some(value),
        });
        self
    }

    pub fn removing_all(mut self, property: impl Into<String>) -> Self {
        self.remove.push(Removal {
            property: property.into(),
            value: None,
        });
        self
    }

    /// Replace a property's values: remove all, then add
    pub fn replacing(self, property: impl Into<String>, value: Value) -> Self {
        let property = property.into();
        self.removing_all(property.clone()).adding(property, value)
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    /// Every property this patch touches
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.remove
            .iter()
            .map(|r| r.property.as_str())
            .chain(self.add.iter().map(|(p, _)| p.as_str()))
    }

    /// Produce the patched graph. The input is left untouched.
    pub fn apply(&self, graph: &EntityGraph) -> EntityGraph {
        let mut out = graph.clone();
        for removal in &self.remove {
            match &removal.value {
                Some(value) => {
                    out.remove_value(&removal.property, value);
                }
                None => {
                    out.remove_all(&removal.property);
                }
            }
        }
        for (property, value) in &self.add {
            out.add(property.clone(), value.clone());
        }
        out
    }
}
