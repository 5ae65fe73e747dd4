//! Item status lifecycle
//!
//! Allowed transitions:
//!
//! ```text
//! Reserved     -> Submitted
//! Submitted    -> Experimental | Stable | Invalid
//! Experimental -> Stable | Invalid
//! Stable       -> Retired | Superseded | Invalid
//! Retired      -> Invalid
//! Superseded   -> Invalid
//! Invalid      (terminal)
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{RegistryError, RegistryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Reserved,
    Submitted,
    Experimental,
    Stable,
    Retired,
    Superseded,
    Invalid,
}

impl Status {
    pub const ALL: [Status; 7] = [
        Status::Reserved,
        Status::Submitted,
        Status::Experimental,
        Status::Stable,
        Status::Retired,
        Status::Superseded,
        Status::Invalid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Reserved => "reserved",
            Status::Submitted => "submitted",
            Status::Experimental => "experimental",
            Status::Stable => "stable",
            Status::Retired => "retired",
            Status::Superseded => "superseded",
            Status::Invalid => "invalid",
        }
    }

    /// Legal destinations from this status
    pub fn successors(&self) -> &'static [Status] {
        match self {
            Status::Reserved => &[Status::Submitted],
            Status::Submitted => &[Status::Experimental, Status::Stable, Status::Invalid],
            Status::Experimental => &[Status::Stable, Status::Invalid],
            Status::Stable => &[Status::Retired, Status::Superseded, Status::Invalid],
            Status::Retired => &[Status::Invalid],
            Status::Superseded => &[Status::Invalid],
            Status::Invalid => &[],
        }
    }

    pub fn can_transition_to(&self, next: Status) -> bool {
        self.successors().contains(&next)
    }

    /// Validate a transition, failing Forbidden for any edge not in the table
    pub fn transition(self, next: Status) -> RegistryResult<Status> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(RegistryError::forbidden(format!(
                "status transition {} -> {} is not allowed",
                self, next
            )))
        }
    }

    /// Stable, Retired or Superseded
    pub fn is_accepted(&self) -> bool {
        matches!(self, Status::Stable | Status::Retired | Status::Superseded)
    }

    /// Experimental or accepted
    pub fn is_valid(&self) -> bool {
        matches!(self, Status::Experimental) || self.is_accepted()
    }

    /// First entry into one of these stamps the acceptance date
    pub fn stamps_acceptance(&self) -> bool {
        matches!(self, Status::Experimental | Status::Stable)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Invalid)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = RegistryError;

    /// Parse a status token. Case-insensitive; an optional `status`
    /// prefix (`statusStable`) is accepted.
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let lower = token.trim().to_ascii_lowercase();
        let bare = lower.strip_prefix("status").unwrap_or(&lower);
        Status::ALL
            .iter()
            .copied()
            .find(|s| s.as_str() == bare)
            .ok_or_else(|| {
                RegistryError::validation("status", format!("unrecognized status token '{}'", token))
            })
    }
}

/// Status predicate used when listing register members
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Any,
    /// Experimental, Stable, Retired, Superseded
    Valid,
    /// Stable, Retired, Superseded
    Accepted,
    /// Complement of `Accepted`
    NotAccepted,
    Only(Status),
}

impl StatusFilter {
    pub fn matches(&self, status: Status) -> bool {
        match self {
            StatusFilter::Any => true,
            StatusFilter::Valid => status.is_valid(),
            StatusFilter::Accepted => status.is_accepted(),
            StatusFilter::NotAccepted => !status.is_accepted(),
            StatusFilter::Only(s) => *s == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = RegistryError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(StatusFilter::Any),
            "valid" => Ok(StatusFilter::Valid),
            "accepted" => Ok(StatusFilter::Accepted),
            "notaccepted" => Ok(StatusFilter::NotAccepted),
            _ => token.parse().map(StatusFilter::Only),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_transition_table() {
        let allowed: Vec<(Status, Status)> = vec![
            (Status::Reserved, Status::Submitted),
            (Status::Submitted, Status::Experimental),
            (Status::Submitted, Status::Stable),
            (Status::Submitted, Status::Invalid),
            (Status::Experimental, Status::Stable),
            (Status::Experimental, Status::Invalid),
            (Status::Stable, Status::Retired),
            (Status::Stable, Status::Superseded),
            (Status::Stable, Status::Invalid),
            (Status::Retired, Status::Invalid),
            (Status::Superseded, Status::Invalid),
        ];

        for from in Status::ALL {
            for to in Status::ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(from.can_transition_to(to), expected, "{} -> {}", from, to);
                if !expected {
                    assert_eq!(from.transition(to).unwrap_err().kind(), ErrorKind::Forbidden);
                }
            }
        }
    }

    #[test]
    fn test_invalid_is_terminal() {
        assert!(Status::Invalid.successors().is_empty());
        assert!(Status::Invalid.is_terminal());
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!("stable".parse::<Status>().unwrap(), Status::Stable);
        assert_eq!("Experimental".parse::<Status>().unwrap(), Status::Experimental);
        assert_eq!("statusRetired".parse::<Status>().unwrap(), Status::Retired);
        let err = "bogus".parse::<Status>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn test_filters() {
        assert!(StatusFilter::Valid.matches(Status::Experimental));
        assert!(!StatusFilter::Valid.matches(Status::Submitted));
        assert!(StatusFilter::Accepted.matches(Status::Superseded));
        assert!(!StatusFilter::Accepted.matches(Status::Experimental));
        assert!(StatusFilter::NotAccepted.matches(Status::Reserved));
        assert!(StatusFilter::NotAccepted.matches(Status::Invalid));
        assert!(StatusFilter::Any.matches(Status::Invalid));

        assert_eq!("notaccepted".parse::<StatusFilter>().unwrap(), StatusFilter::NotAccepted);
        assert_eq!(
            "stable".parse::<StatusFilter>().unwrap(),
            StatusFilter::Only(Status::Stable)
        );
        assert!("nope".parse::<StatusFilter>().is_err());
    }
}
