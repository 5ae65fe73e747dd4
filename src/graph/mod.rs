//! Entity graph subsystem
//!
//! Generic property/value payloads for registered resources:
//! - `EntityGraph` - URI plus property statements
//! - `Value` / `Literal` - statement objects (literal, reference, nested graph)
//! - `GraphPatch` - additive/subtractive diff
//! - `vocab` - identifiers the registry interprets

mod patch;
mod types;
pub mod vocab;

pub use patch::{GraphPatch, Removal};
pub use types::{EntityGraph, Literal, Value, ValueKind};
