//! Bootstrap loading
//!
//! A bootstrap document seeds an empty store: the root register's
//! description plus entries registered in order. Each entry may name a
//! target status, reached through legal transitions.
//!
//! ```json
//! {
//!   "root": { "uri": "", "properties": { "...#label": [{ "literal": "root" }] } },
//!   "entries": [
//!     { "parent": "http://example.com/", "notation": "reg1", "status": "stable",
//!       "entity": { "uri": "", "properties": { ... } } }
//!   ]
//! }
//! ```

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::engine::Store;
use crate::errors::{RegistryError, RegistryResult};
use crate::graph::EntityGraph;
use crate::observability::{log_event_with_fields, Event};
use crate::registry::{ItemRequest, Status};
use crate::validation::Constraint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapEntry {
    /// Register (or register item) URI to register into
    pub parent: String,
    pub entity: EntityGraph,
    #[serde(default)]
    pub notation: Option<String>,
    /// Target status; Submitted when absent
    #[serde(default)]
    pub status: Option<Status>,
    /// Member constraints when the entity is a register
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bootstrap {
    pub root: EntityGraph,
    #[serde(default)]
    pub entries: Vec<BootstrapEntry>,
}

impl Bootstrap {
    pub fn load(path: &Path) -> RegistryResult<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            RegistryError::Config(format!("Invalid bootstrap {}: {}", path.display(), e))
        })
    }
}

/// Shortest sequence of legal transitions from `from` to `to`
fn transition_path(from: Status, to: Status) -> Option<Vec<Status>> {
    let mut previous: HashMap<Status, Status> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    while let Some(s) = queue.pop_front() {
        if s == to {
            let mut path = vec![to];
            let mut cur = to;
            while let Some(p) = previous.get(&cur) {
                if *p == from {
                    break;
                }
                path.push(*p);
                cur = *p;
            }
            path.reverse();
            return Some(if from == to { Vec::new() } else { path });
        }
        for next in s.successors() {
            if *next != from && !previous.contains_key(next) {
                previous.insert(*next, s);
                queue.push_back(*next);
            }
        }
    }
    None
}

impl Store {
    /// Create the root register and register every entry in order.
    /// Returns the number of entries registered.
    pub fn bootstrap(&self, doc: &Bootstrap) -> RegistryResult<usize> {
        self.create_root(doc.root.clone())?;

        for (i, entry) in doc.entries.iter().enumerate() {
            let mut request = match (&entry.status, &entry.notation) {
                (Some(Status::Reserved), Some(n)) => ItemRequest::reserved(n.clone(), entry.entity.clone()),
                (Some(Status::Reserved), None) => {
                    return Err(RegistryError::Config(format!(
                        "bootstrap entry {} is reserved but has no notation",
                        i + 1
                    )))
                }
                _ => ItemRequest::new(entry.entity.clone()),
            };
            if let Some(n) = &entry.notation {
                request = request.with_notation(n.clone());
            }
            request = request.with_constraints(entry.constraints.clone());

            let item = self.add_to_register(&entry.parent, request)?;
            if let Some(target) = entry.status {
                let path = transition_path(item.status, target).ok_or_else(|| {
                    RegistryError::Config(format!(
                        "bootstrap entry {}: status {} is unreachable from {}",
                        i + 1,
                        target,
                        item.status
                    ))
                })?;
                for status in path {
                    self.set_status(&item.uri, status)?;
                }
            }
        }

        log_event_with_fields(
            Event::BootstrapLoaded,
            &[
                ("root", self.root_uri()),
                ("entries", &doc.entries.len().to_string()),
            ],
        );
        Ok(doc.entries.len())
    }

    /// Load a bootstrap document from disk and apply it
    pub fn load_bootstrap(&self, path: &Path) -> RegistryResult<usize> {
        let doc = Bootstrap::load(path)?;
        self.bootstrap(&doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_paths() {
        assert_eq!(transition_path(Status::Submitted, Status::Submitted), Some(vec![]));
        assert_eq!(
            transition_path(Status::Submitted, Status::Stable),
            Some(vec![Status::Stable])
        );
        assert_eq!(
            transition_path(Status::Submitted, Status::Retired),
            Some(vec![Status::Stable, Status::Retired])
        );
        assert_eq!(
            transition_path(Status::Reserved, Status::Invalid),
            Some(vec![Status::Submitted, Status::Invalid])
        );
        assert_eq!(transition_path(Status::Stable, Status::Submitted), None);
    }
}
