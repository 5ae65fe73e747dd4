//! Property and type identifiers the registry itself understands.
//!
//! Everything else in an entity graph is opaque to the store.

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const DCT_DESCRIPTION: &str = "http://purl.org/dc/terms/description";
pub const DCT_DATE_SUBMITTED: &str = "http://purl.org/dc/terms/dateSubmitted";
pub const DCT_DATE_ACCEPTED: &str = "http://purl.org/dc/terms/dateAccepted";
pub const DCT_MODIFIED: &str = "http://purl.org/dc/terms/modified";
pub const OWL_VERSION_INFO: &str = "http://www.w3.org/2002/07/owl#versionInfo";

pub const REG: &str = "http://purl.org/linked-data/registry#";
pub const REG_REGISTER: &str = "http://purl.org/linked-data/registry#Register";
pub const REG_REGISTER_ITEM: &str = "http://purl.org/linked-data/registry#RegisterItem";
pub const REG_CONTAINED_ITEM_CLASS: &str = "http://purl.org/linked-data/registry#containedItemClass";
pub const REG_PARENT: &str = "http://purl.org/linked-data/registry#register";
pub const REG_STATUS: &str = "http://purl.org/linked-data/registry#status";
pub const REG_NOTATION: &str = "http://purl.org/linked-data/registry#notation";
pub const REG_ITEM_CLASS: &str = "http://purl.org/linked-data/registry#itemClass";
pub const REG_MEMBER: &str = "http://www.w3.org/2000/01/rdf-schema#member";

/// Properties managed by the store. Caller payloads may not set them.
pub const PROTECTED_PROPERTIES: &[&str] = &[
    REG_PARENT,
    REG_STATUS,
    REG_NOTATION,
    REG_ITEM_CLASS,
    OWL_VERSION_INFO,
    DCT_DATE_SUBMITTED,
    DCT_DATE_ACCEPTED,
    DCT_MODIFIED,
];

/// Returns true if `property` is managed by the store
pub fn is_protected(property: &str) -> bool {
    PROTECTED_PROPERTIES.contains(&property)
}
