//! # Registry Errors
//!
//! Every failure the store can report. All errors are synchronous, local
//! and typed; the store never retries on the caller's behalf.

use std::fmt;

use thiserror::Error;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// The closed set of failure kinds a caller can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Forbidden,
    ValidationError,
    Busy,
    Internal,
}

/// A single violated rule.
///
/// `candidate` is set when the violation was found while validating one
/// entry of a bulk request, and holds that entry's position (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Resource the rule was evaluated against
    pub subject: String,
    /// Human-readable statement of the rule
    pub rule: String,
    /// Bulk candidate position, if any
    pub candidate: Option<usize>,
}

impl Violation {
    pub fn new(subject: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            rule: rule.into(),
            candidate: None,
        }
    }

    /// Tag this violation with the bulk candidate it came from
    pub fn for_candidate(mut self, candidate: usize) -> Self {
        self.candidate = Some(candidate);
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.candidate {
            Some(n) => write!(f, "candidate {} <{}>: {}", n, self.subject, self.rule),
            None => write!(f, "<{}>: {}", self.subject, self.rule),
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    // ==================
    // Lookup
    // ==================
    /// No matching resource, version or timestamp
    #[error("Not found: {0}")]
    NotFound(String),

    // ==================
    // Write contention
    // ==================
    /// Notation collision or version race
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Lock not acquired within the configured bound
    #[error("Busy: lock on {target} not acquired within {waited_ms}ms")]
    Busy { target: String, waited_ms: u64 },

    // ==================
    // Rule enforcement
    // ==================
    /// Illegal status transition or mutation of a protected property
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Structural or type constraint violation
    #[error("Validation failed: {}", join_violations(.0))]
    Validation(Vec<Violation>),

    // ==================
    // Ambient
    // ==================
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bootstrap or config file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant broken (poisoned lock, dispatcher gone)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    pub fn forbidden(what: impl Into<String>) -> Self {
        Self::Forbidden(what.into())
    }

    /// A validation failure with a single violated rule
    pub fn validation(subject: impl Into<String>, rule: impl Into<String>) -> Self {
        Self::Validation(vec![Violation::new(subject, rule)])
    }

    pub fn internal(what: impl Into<String>) -> Self {
        Self::Internal(what.into())
    }

    /// Map to the closed kind set
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Busy { .. } => ErrorKind::Busy,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Validation(_) | Self::Config(_) => ErrorKind::ValidationError,
            Self::Io(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable error code for the binding layer
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "REG_NOT_FOUND",
            Self::Conflict(_) => "REG_CONFLICT",
            Self::Busy { .. } => "REG_BUSY",
            Self::Forbidden(_) => "REG_FORBIDDEN",
            Self::Validation(_) => "REG_VALIDATION_FAILED",
            Self::Config(_) => "REG_CONFIG_ERROR",
            Self::Io(_) => "REG_IO_ERROR",
            Self::Internal(_) => "REG_INTERNAL_ERROR",
        }
    }

    /// HTTP status a binding layer would report
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Busy { .. } => 503,
            Self::Forbidden(_) => 403,
            Self::Validation(_) | Self::Config(_) => 400,
            Self::Io(_) | Self::Internal(_) => 500,
        }
    }

    /// Only lock timeouts are worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }

    /// Violations carried by a validation failure, empty otherwise
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Validation(v) => v,
            _ => &[],
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}
