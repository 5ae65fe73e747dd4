//! Change events published after commit

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// First version of an item or register
    Created,
    /// Payload or membership superseded
    Updated,
    /// Status transition (other than to Invalid)
    StatusChanged,
    /// Transition to Invalid
    Deleted,
    /// Tag captured on a register
    Tagged,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::StatusChanged => "status_changed",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Tagged => "tagged",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Publication order within this process. Delivery order is not
    /// guaranteed to follow it.
    pub sequence: u64,
    pub uri: String,
    pub kind: ChangeKind,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(sequence: u64, uri: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            sequence,
            uri: uri.into(),
            kind,
            timestamp: Utc::now(),
        }
    }
}
