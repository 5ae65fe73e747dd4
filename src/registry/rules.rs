//! Entity and identity rules enforced before any write

use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use super::register::Register;
use super::request::ItemRequest;
use crate::errors::{RegistryError, RegistryResult, Violation};
use crate::graph::{vocab, EntityGraph};
use crate::validation::{check_constraints, ConstraintValidator};

fn notation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").expect("notation pattern is valid")
    })
}

/// Notation must be a usable local name
pub fn check_notation(notation: &str) -> Result<(), Violation> {
    if notation_pattern().is_match(notation) {
        Ok(())
    } else {
        Err(Violation::new(
            notation,
            "notation must match [A-Za-z0-9_][A-Za-z0-9_.-]*",
        ))
    }
}

/// Reject payloads that try to set store-managed properties
pub fn check_protected(graph: &EntityGraph) -> RegistryResult<()> {
    match graph.property_names().find(|p| vocab::is_protected(p)) {
        Some(p) => Err(RegistryError::forbidden(format!(
            "<{}> is managed by the registry and cannot be set on <{}>",
            p,
            graph.uri()
        ))),
        None => Ok(()),
    }
}

/// Notation for a request: explicit, else the entity URI's last segment,
/// else a generated one.
pub fn derive_notation(request: &ItemRequest) -> String {
    if let Some(n) = &request.notation {
        return n.clone();
    }
    if !request.wants_managed_uri() {
        let uri = request.entity.uri().trim_end_matches('/');
        if let Some(local) = uri.rsplit(['/', '#']).next() {
            if !local.is_empty() {
                return local.to_string();
            }
        }
    }
    Uuid::new_v4().simple().to_string()
}

/// Structural rules every entity must satisfy within `register`
pub fn entity_violations(
    entity: &EntityGraph,
    register: &Register,
    validator: &dyn ConstraintValidator,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    if entity.label().is_none() {
        violations.push(Violation::new(entity.uri(), "a label is required"));
    }
    if entity.types().is_empty() {
        violations.push(Violation::new(entity.uri(), "a type declaration is required"));
    }
    if let Some(class) = &register.contained_item_class {
        if !entity.has_type(class) {
            violations.push(Violation::new(
                entity.uri(),
                format!("register <{}> only accepts members of type <{}>", register.uri, class),
            ));
        }
    }
    violations.extend(check_constraints(validator, entity, &register.constraints));
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Value;
    use crate::validation::{Constraint, ShapeValidator};

    const CONCEPT: &str = "http://www.w3.org/2004/02/skos/core#Concept";

    fn reg1() -> Register {
        let d = EntityGraph::new("http://example.com/reg1")
            .with(vocab::REG_CONTAINED_ITEM_CLASS, Value::uri(CONCEPT));
        Register::new("http://example.com/reg1", d)
    }

    #[test]
    fn test_notation_syntax() {
        assert!(check_notation("red").is_ok());
        assert!(check_notation("15").is_ok());
        assert!(check_notation("a.b-c_d").is_ok());
        assert!(check_notation("").is_err());
        assert!(check_notation("has space").is_err());
        assert!(check_notation("-lead").is_err());
    }

    #[test]
    fn test_protected_properties_forbidden() {
        let g = EntityGraph::new("http://example.com/x")
            .with(vocab::REG_PARENT, Value::uri("http://example.com/other"));
        let err = check_protected(&g).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Forbidden);
        assert!(check_protected(&EntityGraph::new("x").labelled("ok")).is_ok());
    }

    #[test]
    fn test_derive_notation() {
        let req = ItemRequest::new(EntityGraph::new("http://example.com/colours/black"));
        assert_eq!(derive_notation(&req), "black");
        let req = ItemRequest::new(EntityGraph::new("http://example.com/onto#Thing"));
        assert_eq!(derive_notation(&req), "Thing");
        let req = req.with_notation("explicit");
        assert_eq!(derive_notation(&req), "explicit");
        let generated = derive_notation(&ItemRequest::new(EntityGraph::new("")));
        assert!(check_notation(&generated).is_ok());
    }

    #[test]
    fn test_entity_violations() {
        let good = EntityGraph::new("http://example.com/reg1/red")
            .labelled("red")
            .typed(CONCEPT);
        assert!(entity_violations(&good, &reg1(), &ShapeValidator).is_empty());

        let bad = EntityGraph::new("http://example.com/reg1/green").typed("http://example.com/Other");
        let violations = entity_violations(&bad, &reg1(), &ShapeValidator);
        assert_eq!(violations.len(), 2);
        assert!(violations[0].rule.contains("label"));
        assert!(violations[1].rule.contains(CONCEPT));
    }

    #[test]
    fn test_register_constraints_applied() {
        let mut reg = reg1();
        reg.constraints = vec![Constraint::required_property(vocab::DCT_DESCRIPTION)];
        let e = EntityGraph::new("http://example.com/reg1/red")
            .labelled("red")
            .typed(CONCEPT);
        let violations = entity_violations(&e, &reg, &ShapeValidator);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].rule.contains("description"));
    }
}
