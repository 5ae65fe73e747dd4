//! regstore - a versioned, hierarchical metadata registry store
//!
//! Registers hold register items; every register and item keeps a complete,
//! queryable version history. Mutations are serialized per resource,
//! status changes follow a fixed lifecycle, register membership can be
//! reconstructed at any past instant, and committed changes are published
//! to listeners for cache invalidation.

pub mod cli;
pub mod errors;
pub mod graph;
pub mod lock;
pub mod notify;
pub mod observability;
pub mod registry;
pub mod store;
pub mod validation;
pub mod version;

pub use errors::{ErrorKind, RegistryError, RegistryResult, Violation};
pub use graph::{EntityGraph, GraphPatch, Value};
pub use registry::{ItemRequest, RegisterItem, Status, StatusFilter};
pub use store::{Store, StoreConfig};
