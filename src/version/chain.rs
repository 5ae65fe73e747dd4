//! VersionChain - immutable snapshot history of one resource
//!
//! - Versions are numbered 1..N in append order
//! - Exactly one version (the last) is open
//! - Sealed intervals are contiguous: `to[i] == from[i + 1]`
//! - Appends must move strictly forward in time

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::info::{VersionInfo, VersionSelector};
use crate::errors::{RegistryError, RegistryResult};

/// One immutable snapshot plus its interval
#[derive(Debug)]
pub struct Version<T> {
    info: VersionInfo,
    snapshot: Arc<T>,
}

impl<T> Version<T> {
    #[inline]
    pub fn info(&self) -> &VersionInfo {
        &self.info
    }

    #[inline]
    pub fn number(&self) -> u64 {
        self.info.version
    }

    /// Shared handle to the snapshot
    #[inline]
    pub fn snapshot(&self) -> Arc<T> {
        Arc::clone(&self.snapshot)
    }
}

impl<T> Clone for Version<T> {
    fn clone(&self) -> Self {
        Self {
            info: self.info.clone(),
            snapshot: Arc::clone(&self.snapshot),
        }
    }
}

/// The complete history of a single resource.
#[derive(Debug, Clone)]
pub struct VersionChain<T> {
    key: String,
    versions: Vec<Version<T>>,
}

impl<T> VersionChain<T> {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            versions: Vec::new(),
        }
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Check that an append at `at` would be accepted, without appending
    pub fn check_append(&self, at: DateTime<Utc>) -> RegistryResult<()> {
        if let Some(last) = self.versions.last() {
            if at <= last.info.from {
                return Err(RegistryError::conflict(format!(
                    "version race on {}: append at {} not after version {} at {}",
                    self.key,
                    at.to_rfc3339(),
                    last.info.version,
                    last.info.from.to_rfc3339()
                )));
            }
        }
        Ok(())
    }

    /// Append a new current version, sealing the previous one at `at`.
    pub fn append(&mut self, snapshot: T, at: DateTime<Utc>) -> RegistryResult<VersionInfo> {
        self.check_append(at)?;
        if let Some(last) = self.versions.last_mut() {
            last.info.to = Some(at);
        }
        let info = VersionInfo::new(&self.key, self.versions.len() as u64 + 1, at);
        self.versions.push(Version {
            info: info.clone(),
            snapshot: Arc::new(snapshot),
        });
        Ok(info)
    }

    /// The open version
    pub fn current(&self) -> RegistryResult<&Version<T>> {
        self.versions
            .last()
            .ok_or_else(|| RegistryError::not_found(format!("no versions of {}", self.key)))
    }

    /// The version whose `[from, to)` interval contains `t`
    pub fn version_at(&self, t: DateTime<Utc>) -> RegistryResult<&Version<T>> {
        let idx = self.versions.partition_point(|v| v.info.from <= t);
        if idx == 0 {
            return Err(RegistryError::not_found(format!(
                "{} did not exist at {}",
                self.key,
                t.to_rfc3339()
            )));
        }
        Ok(&self.versions[idx - 1])
    }

    /// Version by number (1-based)
    pub fn version(&self, number: u64) -> RegistryResult<&Version<T>> {
        number
            .checked_sub(1)
            .and_then(|i| self.versions.get(i as usize))
            .ok_or_else(|| {
                RegistryError::not_found(format!("version {} of {}", number, self.key))
            })
    }

    pub fn select(&self, selector: VersionSelector) -> RegistryResult<&Version<T>> {
        match selector {
            VersionSelector::Number(n) => self.version(n),
            VersionSelector::At(t) => self.version_at(t),
        }
    }

    /// All versions, oldest first
    pub fn list_versions(&self) -> Vec<VersionInfo> {
        self.versions.iter().map(|v| v.info.clone()).collect()
    }
}
