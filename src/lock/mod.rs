//! Lock registry
//!
//! Serializes mutating operations per logical resource. Distinct targets
//! may be held concurrently; there is no cross-target ordering.

mod registry;

pub use registry::{LockGuard, LockRegistry};
