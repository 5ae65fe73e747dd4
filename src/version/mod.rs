//! Version history
//!
//! - `VersionChain<T>` - totally ordered, append-only snapshots per resource
//! - `VersionInfo` - `{uri, version, from, to}` with half-open intervals
//! - `VersionSelector` - pick a version by number or instant

mod chain;
mod info;

pub use chain::{Version, VersionChain};
pub use info::{split_version_uri, version_uri, VersionInfo, VersionSelector};
