//! Version metadata and selectors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Description of one version of a resource.
///
/// The interval `[from, to)` is closed below and open above. `to` is `None`
/// for the current version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Version URI (`<resource>:<n>`)
    pub uri: String,
    /// The versioned resource
    pub resource: String,
    /// Version number, from 1
    pub version: u64,
    pub from: DateTime<Utc>,
    pub to: Option<DateTime<Utc>>,
}

impl VersionInfo {
    pub fn new(resource: &str, version: u64, from: DateTime<Utc>) -> Self {
        Self {
            uri: version_uri(resource, version),
            resource: resource.to_string(),
            version,
            from,
            to: None,
        }
    }

    #[inline]
    pub fn is_current(&self) -> bool {
        self.to.is_none()
    }

    /// True if `t` falls inside `[from, to)`
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.from <= t && self.to.map_or(true, |to| t < to)
    }

    /// URI of the version this one replaces, if any
    pub fn replaces(&self) -> Option<String> {
        (self.version > 1).then(|| version_uri(&self.resource, self.version - 1))
    }
}

/// How to pick a historical version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    Number(u64),
    At(DateTime<Utc>),
}

/// Build the URI of a specific version
pub fn version_uri(resource: &str, version: u64) -> String {
    format!("{}:{}", resource, version)
}

/// Split `<resource>:<n>` into its parts.
///
/// A trailing `:<digits>` is only treated as a version number when the
/// remainder still has a path (so `http://host:8080` is not a version).
pub fn split_version_uri(uri: &str) -> (&str, Option<u64>) {
    let Some((base, suffix)) = uri.rsplit_once(':') else {
        return (uri, None);
    };
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return (uri, None);
    }
    let has_path = match base.split_once("://") {
        Some((_, rest)) => rest.contains('/'),
        None => !base.is_empty(),
    };
    match (has_path, suffix.parse::<u64>()) {
        (true, Ok(n)) => (base, Some(n)),
        _ => (uri, None),
    }
}
