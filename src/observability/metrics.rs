//! Store counters
//!
//! Counters only, monotonic, reset on process start.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for one store.
///
/// Relaxed ordering throughout; values are eventually consistent.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    commits: AtomicU64,
    versions_appended: AtomicU64,
    conflicts: AtomicU64,
    forbidden: AtomicU64,
    validation_rejections: AtomicU64,
    lock_timeouts: AtomicU64,
    notifications_published: AtomicU64,
    notifications_delivered: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub commits: u64,
    pub versions_appended: u64,
    pub conflicts: u64,
    pub forbidden: u64,
    pub validation_rejections: u64,
    pub lock_timeouts: u64,
    pub notifications_published: u64,
    pub notifications_delivered: u64,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// One committed change set appending `versions` snapshots
    pub fn record_commit(&self, versions: u64) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        self.versions_appended.fetch_add(versions, Ordering::Relaxed);
    }

    /// Count a rejected write by its error kind
    pub fn record_rejection(&self, err: &crate::errors::RegistryError) {
        use crate::errors::ErrorKind;
        let counter = match err.kind() {
            ErrorKind::Conflict => &self.conflicts,
            ErrorKind::Forbidden => &self.forbidden,
            ErrorKind::ValidationError => &self.validation_rejections,
            ErrorKind::Busy => &self.lock_timeouts,
            ErrorKind::NotFound | ErrorKind::Internal => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_published(&self) {
        self.notifications_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_delivered(&self) {
        self.notifications_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commits: self.commits.load(Ordering::Relaxed),
            versions_appended: self.versions_appended.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            forbidden: self.forbidden.load(Ordering::Relaxed),
            validation_rejections: self.validation_rejections.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
            notifications_published: self.notifications_published.load(Ordering::Relaxed),
            notifications_delivered: self.notifications_delivered.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RegistryError;

    #[test]
    fn test_commit_counters() {
        let metrics = StoreMetrics::new();
        metrics.record_commit(2);
        metrics.record_commit(1);
        let snap = metrics.snapshot();
        assert_eq!(snap.commits, 2);
        assert_eq!(snap.versions_appended, 3);
    }

    #[test]
    fn test_rejections_by_kind() {
        let metrics = StoreMetrics::new();
        metrics.record_rejection(&RegistryError::conflict("x"));
        metrics.record_rejection(&RegistryError::forbidden("x"));
        metrics.record_rejection(&RegistryError::validation("s", "r"));
        metrics.record_rejection(&RegistryError::not_found("x"));
        let snap = metrics.snapshot();
        assert_eq!(snap.conflicts, 1);
        assert_eq!(snap.forbidden, 1);
        assert_eq!(snap.validation_rejections, 1);
        assert_eq!(snap.lock_timeouts, 0);
    }
}
