//! Declarative per-register constraints

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::ValueKind;

/// A rule every member entity of a register must satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Constraint {
    /// Property must carry at least one value
    RequiredProperty { property: String },
    /// Entity must declare this `rdf:type`
    RequiredType { type_uri: String },
    /// Every value of the property must be of this kind
    ValueKind { property: String, kind: ValueKind },
    /// Property may carry at most `max` values
    MaxCount { property: String, max: usize },
}

impl Constraint {
    pub fn required_property(property: impl Into<String>) -> Self {
        Constraint::RequiredProperty {
            property: property.into(),
        }
    }

    pub fn required_type(type_uri: impl Into<String>) -> Self {
        Constraint::RequiredType {
            type_uri: type_uri.into(),
        }
    }

    pub fn value_kind(property: impl Into<String>, kind: ValueKind) -> Self {
        Constraint::ValueKind {
            property: property.into(),
            kind,
        }
    }

    pub fn max_count(property: impl Into<String>, max: usize) -> Self {
        Constraint::MaxCount {
            property: property.into(),
            max,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::RequiredProperty { property } => {
                write!(f, "property <{}> is required", property)
            }
            Constraint::RequiredType { type_uri } => write!(f, "type <{}> is required", type_uri),
            Constraint::ValueKind { property, kind } => {
                write!(f, "values of <{}> must be {}", property, kind.name())
            }
            Constraint::MaxCount { property, max } => {
                write!(f, "property <{}> allows at most {} values", property, max)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_rule() {
        let c = Constraint::required_type("http://example.com/Colour");
        assert_eq!(c.to_string(), "type <http://example.com/Colour> is required");
    }

    #[test]
    fn test_json_form() {
        let c: Constraint = serde_json::from_str(
            r#"{"rule":"value_kind","property":"http://example.com/p","kind":"integer"}"#,
        )
        .unwrap();
        assert_eq!(c, Constraint::value_kind("http://example.com/p", ValueKind::Integer));
    }
}
