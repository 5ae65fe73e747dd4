//! Bulk registration
//!
//! A batch creates one new register under a parent and fills it in a
//! single commit. Every candidate is validated before anything is written;
//! if any candidate fails, the whole batch is rejected with every
//! violation found, each tagged with its candidate position (1-based).
//! [`Store::add_many`] applies the same rule to several new members of an
//! existing register.

use std::collections::{BTreeMap, HashSet};

use super::engine::Store;
use super::lifecycle::Staged;
use super::records::ItemRecord;
use super::state::{ChangeSet, State};
use crate::errors::{RegistryError, RegistryResult, Violation};
use crate::graph::{vocab, EntityGraph, Value};
use crate::notify::ChangeKind;
use crate::observability::{log_event_with_fields, Event};
use crate::registry::rules::{check_notation, derive_notation};
use crate::registry::{EntityBody, ItemRequest, Register, RegisterItem, Status};
use crate::validation::check_constraints;

/// How batch members enter the new register
#[derive(Debug, Clone, PartialEq)]
pub enum BatchMembers {
    /// Each candidate becomes a newly owned item
    Managed(Vec<ItemRequest>),
    /// Already-registered entities, linked by URI without re-registering
    Referenced(Vec<String>),
}

impl BatchMembers {
    pub fn len(&self) -> usize {
        match self {
            BatchMembers::Managed(m) => m.len(),
            BatchMembers::Referenced(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    /// The containing register to create
    pub register: ItemRequest,
    pub members: BatchMembers,
}

impl BatchRequest {
    pub fn managed(register: ItemRequest, members: Vec<ItemRequest>) -> Self {
        Self {
            register,
            members: BatchMembers::Managed(members),
        }
    }

    pub fn referenced(register: ItemRequest, entities: Vec<String>) -> Self {
        Self {
            register,
            members: BatchMembers::Referenced(entities),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// Item of the created register
    pub register: RegisterItem,
    pub members: Vec<RegisterItem>,
}

/// Fold a candidate's failure into violations; infrastructure failures
/// abort the batch instead
fn candidate_violations(err: RegistryError, candidate: usize, subject: &str) -> RegistryResult<Vec<Violation>> {
    match err {
        RegistryError::Validation(vs) => Ok(vs.into_iter().map(|v| v.for_candidate(candidate)).collect()),
        RegistryError::Conflict(msg) | RegistryError::Forbidden(msg) | RegistryError::NotFound(msg) => {
            Ok(vec![Violation::new(subject, msg).for_candidate(candidate)])
        }
        other => Err(other),
    }
}

impl Store {
    /// Create a register under `parent` holding every batch member.
    ///
    /// Locks the new register's URI, then the parent's.
    pub fn register_batch(&self, parent: &str, request: BatchRequest) -> RegistryResult<BatchOutcome> {
        let mut register_request = request.register;
        if !register_request.entity.has_type(vocab::REG_REGISTER) {
            register_request
                .entity
                .add(vocab::RDF_TYPE, Value::uri(vocab::REG_REGISTER));
        }

        let (parent_uri, register_uri) = {
            let state = self.read_state()?;
            let parent_uri = state.resolve_register_uri(parent)?;
            let parent = state.current_register(&parent_uri)?;
            let register_uri = parent.child_uri(&derive_notation(&register_request));
            (parent_uri, register_uri)
        };

        let _register_guard = self
            .locks
            .acquire(&register_uri)
            .map_err(|e| self.rejected("register_batch", &register_uri, e))?;
        let _parent_guard = self
            .locks
            .acquire(&parent_uri)
            .map_err(|e| self.rejected("register_batch", &parent_uri, e))?;

        self.batch_locked(&parent_uri, &register_request, &request.members)
            .map_err(|e| self.rejected("register_batch", &register_uri, e))
    }

    /// Register several items into the existing register `parent` in one
    /// commit.
    ///
    /// Every request is validated first, against the register and against
    /// the requests before it. Any failure rejects them all, with each
    /// violation tagged by its candidate position.
    pub fn add_many(&self, parent: &str, requests: Vec<ItemRequest>) -> RegistryResult<Vec<RegisterItem>> {
        let parent_uri = self.read_state()?.resolve_register_uri(parent)?;
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let _guard = self
            .locks
            .acquire(&parent_uri)
            .map_err(|e| self.rejected("add_many", &parent_uri, e))?;

        self.add_many_locked(&parent_uri, &requests)
            .map_err(|e| self.rejected("add_many", &parent_uri, e))
    }

    fn add_many_locked(&self, parent_uri: &str, requests: &[ItemRequest]) -> RegistryResult<Vec<RegisterItem>> {
        let at = self.clock.now();
        let mut violations = Vec::new();

        let (mut next_parent, staged) = {
            let state = self.read_state()?;
            let parent = state.current_register(parent_uri)?;
            Self::ensure_register_open(&state, &parent)?;
            let mut next_parent = parent.as_ref().clone();
            let staged = self.stage_managed(&state, &mut next_parent, requests, at, &mut violations)?;
            (next_parent, staged)
        };

        if !violations.is_empty() {
            return Err(RegistryError::Validation(violations));
        }
        next_parent.version += 1;

        let items: Vec<RegisterItem> = staged.iter().map(|s| s.record.item.clone()).collect();
        let mut changes = ChangeSet::new();
        for s in staged {
            s.stage_into(&mut changes);
        }
        changes.register(next_parent, ChangeKind::Updated);
        self.commit(changes, at)?;

        log_event_with_fields(
            Event::BatchRegistered,
            &[("register", parent_uri), ("members", &items.len().to_string())],
        );
        Ok(items)
    }

    fn batch_locked(
        &self,
        parent_uri: &str,
        register_request: &ItemRequest,
        members: &BatchMembers,
    ) -> RegistryResult<BatchOutcome> {
        let at = self.clock.now();
        let mut violations = Vec::new();

        let (staged_register, parent, mut container, staged_members) = {
            let state = self.read_state()?;
            let parent = state.current_register(parent_uri)?;
            Self::ensure_register_open(&state, &parent)?;

            let staged_register =
                match self.stage_registration(&state, &parent, register_request, at, &HashSet::new()) {
                    Ok(s) => Some(s),
                    Err(RegistryError::Validation(vs)) => {
                        violations.extend(vs);
                        None
                    }
                    Err(e) => return Err(e),
                };

            // members are checked against the register being created, or a
            // provisional one when the register itself is invalid
            let mut container = match staged_register.as_ref().and_then(|s| s.register.clone()) {
                Some(r) => r,
                None => {
                    let mut entity = register_request.entity.clone();
                    let notation = derive_notation(register_request);
                    entity.set_uri(parent.child_uri(&notation));
                    let mut r = Register::new(parent.child_uri(&notation), entity);
                    r.constraints = register_request.constraints.clone();
                    r
                }
            };

            let staged_members = match members {
                BatchMembers::Managed(requests) => {
                    self.stage_managed(&state, &mut container, requests, at, &mut violations)?
                }
                BatchMembers::Referenced(uris) => {
                    self.stage_referenced(&state, &mut container, uris, at, &mut violations)?
                }
            };
            (staged_register, parent, container, staged_members)
        };

        if !violations.is_empty() {
            return Err(RegistryError::Validation(violations));
        }
        let mut staged_register = staged_register
            .ok_or_else(|| RegistryError::internal("batch register missing after validation"))?;

        // the new register lands with its full membership in one version
        let members_map = std::mem::take(&mut container.members);
        if let Some(register) = staged_register.register.as_mut() {
            register.members = members_map;
        }

        let mut next_parent = parent.as_ref().clone();
        next_parent.members.insert(
            staged_register.notation().to_string(),
            staged_register.item_uri().to_string(),
        );
        next_parent.version += 1;

        let register_item = staged_register.record.item.clone();
        let member_items: Vec<RegisterItem> = staged_members.iter().map(|s| s.record.item.clone()).collect();

        let mut changes = ChangeSet::new();
        staged_register.stage_into(&mut changes);
        for staged in staged_members {
            if matches!(staged.record.body, EntityBody::Reference) {
                let kind = if staged.record.version() == 1 {
                    ChangeKind::Created
                } else {
                    ChangeKind::Updated
                };
                changes.item(staged.record, kind);
            } else {
                staged.stage_into(&mut changes);
            }
        }
        changes.register(next_parent, ChangeKind::Updated);
        self.commit(changes, at)?;

        log_event_with_fields(
            Event::BatchRegistered,
            &[
                ("register", &register_item.entity_uri),
                ("parent", parent_uri),
                ("members", &member_items.len().to_string()),
            ],
        );
        Ok(BatchOutcome {
            register: register_item,
            members: member_items,
        })
    }

    fn stage_managed(
        &self,
        state: &State,
        container: &mut Register,
        requests: &[ItemRequest],
        at: chrono::DateTime<chrono::Utc>,
        violations: &mut Vec<Violation>,
    ) -> RegistryResult<Vec<Staged>> {
        let mut pending = HashSet::new();
        let mut staged_members = Vec::new();
        for (i, request) in requests.iter().enumerate() {
            let candidate = i + 1;
            match self.stage_registration(state, container, request, at, &pending) {
                Ok(staged) => {
                    pending.insert(staged.item_uri().to_string());
                    pending.insert(staged.entity_uri().to_string());
                    container
                        .members
                        .insert(staged.notation().to_string(), staged.item_uri().to_string());
                    staged_members.push(staged);
                }
                Err(e) => {
                    let subject = if request.entity.uri().is_empty() {
                        format!("candidate {}", candidate)
                    } else {
                        request.entity.uri().to_string()
                    };
                    violations.extend(candidate_violations(e, candidate, &subject)?);
                }
            }
        }
        Ok(staged_members)
    }

    fn stage_referenced(
        &self,
        state: &State,
        container: &mut Register,
        uris: &[String],
        at: chrono::DateTime<chrono::Utc>,
        violations: &mut Vec<Violation>,
    ) -> RegistryResult<Vec<Staged>> {
        let mut staged_members = Vec::new();
        for (i, uri) in uris.iter().enumerate() {
            let candidate = i + 1;
            match self.stage_reference(state, container, uri, at) {
                Ok(staged) => {
                    container
                        .members
                        .insert(staged.notation().to_string(), staged.item_uri().to_string());
                    staged_members.push(staged);
                }
                Err(e) => violations.extend(candidate_violations(e, candidate, uri)?),
            }
        }
        Ok(staged_members)
    }

    /// Link an existing entity into `container` as a new item
    fn stage_reference(
        &self,
        state: &State,
        container: &Register,
        uri: &str,
        at: chrono::DateTime<chrono::Utc>,
    ) -> RegistryResult<Staged> {
        let owner = state
            .entities
            .get(uri)
            .and_then(|item| state.current_item(item).ok())
            .filter(|r| r.item.is_live())
            .ok_or_else(|| RegistryError::not_found(format!("<{}> is not a registered entity", uri)))?;

        let notation = derive_notation(&ItemRequest::new(EntityGraph::new(uri)));
        check_notation(&notation).map_err(|v| RegistryError::Validation(vec![v]))?;
        if container.members.contains_key(&notation) {
            return Err(RegistryError::conflict(format!(
                "notation '{}' is already used in this batch",
                notation
            )));
        }
        if let Some(class) = &container.contained_item_class {
            if !owner.item.item_class.iter().any(|t| t == class) {
                return Err(RegistryError::validation(
                    uri,
                    format!("register <{}> only accepts members of type <{}>", container.uri, class),
                ));
            }
        }
        if !container.constraints.is_empty() {
            let entity = state
                .entity_of(&owner, None)
                .ok_or_else(|| RegistryError::internal(format!("no entity recorded for <{}>", uri)))?;
            let vs = check_constraints(self.validator.as_ref(), &entity, &container.constraints);
            if !vs.is_empty() {
                return Err(RegistryError::Validation(vs));
            }
        }

        let item_uri = container.item_uri_for(&notation);
        let mut metadata = EntityGraph::new(item_uri.clone());
        if let Some(label) = owner.item.label() {
            metadata.set(vocab::RDFS_LABEL, Value::text(label));
        }
        let item = RegisterItem {
            uri: item_uri.clone(),
            notation,
            register: container.uri.clone(),
            status: Status::Submitted,
            version: state.items.get(&item_uri).map_or(0, |c| c.len() as u64) + 1,
            submitted: at,
            accepted: None,
            modified: at,
            metadata,
            entity_uri: uri.to_string(),
            item_class: owner.item.item_class.clone(),
            entity: None,
            annotations: BTreeMap::new(),
        };
        Ok(Staged {
            record: ItemRecord::new(item, EntityBody::Reference),
            register: None,
        })
    }
}
