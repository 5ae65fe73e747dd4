//! Constraint evaluation
//!
//! Validation is deterministic and never mutates the entity.

use crate::errors::Violation;
use crate::graph::EntityGraph;

use super::constraint::Constraint;

/// Pluggable constraint checker.
///
/// The store only needs a yes/no answer per rule; it names the rule
/// itself when reporting a violation.
pub trait ConstraintValidator: Send + Sync {
    fn validate(&self, entity: &EntityGraph, constraint: &Constraint) -> bool;
}

/// Default validator over the built-in constraint vocabulary
#[derive(Debug, Default, Clone, Copy)]
pub struct ShapeValidator;

impl ConstraintValidator for ShapeValidator {
    fn validate(&self, entity: &EntityGraph, constraint: &Constraint) -> bool {
        match constraint {
            Constraint::RequiredProperty { property } => !entity.values(property).is_empty(),
            Constraint::RequiredType { type_uri } => entity.has_type(type_uri),
            Constraint::ValueKind { property, kind } => {
                entity.values(property).iter().all(|v| v.kind() == *kind)
            }
            Constraint::MaxCount { property, max } => entity.values(property).len() <= *max,
        }
    }
}

/// Evaluate every constraint, collecting one violation per failed rule
pub fn check_constraints(
    validator: &dyn ConstraintValidator,
    entity: &EntityGraph,
    constraints: &[Constraint],
) -> Vec<Violation> {
    constraints
        .iter()
        .filter(|c| !validator.validate(entity, c))
        .map(|c| Violation::new(entity.uri(), c.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{vocab, Value, ValueKind};

    fn concept() -> EntityGraph {
        EntityGraph::new("http://example.com/reg2/c1")
            .labelled("concept 1")
            .typed("http://www.w3.org/2004/02/skos/core#Concept")
            .with("http://example.com/code", Value::integer(7))
    }

    #[test]
    fn test_required_property_and_type() {
        let v = ShapeValidator;
        let e = concept();
        assert!(v.validate(&e, &Constraint::required_property(vocab::RDFS_LABEL)));
        assert!(!v.validate(&e, &Constraint::required_property(vocab::DCT_DESCRIPTION)));
        assert!(v.validate(
            &e,
            &Constraint::required_type("http://www.w3.org/2004/02/skos/core#Concept")
        ));
        assert!(!v.validate(&e, &Constraint::required_type("http://example.com/Other")));
    }

    #[test]
    fn test_value_kind_and_max_count() {
        let v = ShapeValidator;
        let e = concept().with("http://example.com/code", Value::text("seven"));
        assert!(!v.validate(
            &e,
            &Constraint::value_kind("http://example.com/code", ValueKind::Integer)
        ));
        assert!(!v.validate(&e, &Constraint::max_count("http://example.com/code", 1)));
        assert!(v.validate(&e, &Constraint::max_count("http://example.com/code", 2)));
    }

    #[test]
    fn test_check_constraints_reports_each_failure() {
        let constraints = vec![
            Constraint::required_property(vocab::DCT_DESCRIPTION),
            Constraint::required_type("http://example.com/Other"),
            Constraint::required_property(vocab::RDFS_LABEL),
        ];
        let violations = check_constraints(&ShapeValidator, &concept(), &constraints);
        assert_eq!(violations.len(), 2);
        assert!(violations[0].rule.contains("description"));
        assert_eq!(violations[1].subject, "http://example.com/reg2/c1");
    }
}
