//! Registration requests

use crate::graph::EntityGraph;
use crate::validation::Constraint;

/// A candidate for registration into a register.
///
/// An empty entity URI (or a `_:` blank identifier) asks the store to mint
/// the managed identity `<register>/<notation>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRequest {
    pub entity: EntityGraph,
    pub notation: Option<String>,
    /// Extra item-level statements (description, provenance)
    pub metadata: Option<EntityGraph>,
    /// Register under a placeholder identity in the Reserved state
    pub reserved: bool,
    /// Member constraints, when the entity is itself a register
    pub constraints: Vec<Constraint>,
}

impl ItemRequest {
    pub fn new(entity: EntityGraph) -> Self {
        Self {
            entity,
            notation: None,
            metadata: None,
            reserved: false,
            constraints: Vec::new(),
        }
    }

    /// Reserve `notation` with a placeholder entity
    pub fn reserved(notation: impl Into<String>, mut entity: EntityGraph) -> Self {
        entity.set_uri(String::new());
        Self {
            entity,
            notation: Some(notation.into()),
            metadata: None,
            reserved: true,
            constraints: Vec::new(),
        }
    }

    pub fn with_notation(mut self, notation: impl Into<String>) -> Self {
        self.notation = Some(notation.into());
        self
    }

    pub fn with_metadata(mut self, metadata: EntityGraph) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.constraints = constraints;
        self
    }

    /// Entity URI that asks for a minted identity
    pub fn wants_managed_uri(&self) -> bool {
        let uri = self.entity.uri();
        uri.is_empty() || uri.starts_with("_:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_clears_identity() {
        let req = ItemRequest::reserved("six", EntityGraph::new("http://example.com/six"));
        assert!(req.reserved);
        assert!(req.wants_managed_uri());
        assert_eq!(req.notation.as_deref(), Some("six"));
    }

    #[test]
    fn test_blank_identity_is_managed() {
        assert!(ItemRequest::new(EntityGraph::new("_:b1")).wants_managed_uri());
        assert!(!ItemRequest::new(EntityGraph::new("http://example.com/a")).wants_managed_uri());
    }
}
