//! Mutating operations on items and registers
//!
//! Every write runs under the per-resource lock of its target:
//!
//! | operation         | lock                                  |
//! |-------------------|---------------------------------------|
//! | `add_to_register` | parent register URI                   |
//! | `update`/`patch`  | item URI (held by the caller)         |
//! | `set_status`      | item URI                              |
//! | `delete`          | register URI + item URI, then members |
//! | `update_register` | register URI                          |
//! | `set_annotation`  | item URI                              |

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use super::engine::Store;
use super::records::ItemRecord;
use super::state::{ChangeSet, State};
use crate::errors::{RegistryError, RegistryResult};
use crate::graph::{vocab, EntityGraph, GraphPatch, Value};
use crate::lock::LockGuard;
use crate::notify::ChangeKind;
use crate::observability::{log_event_with_fields, Event};
use crate::registry::rules::{check_notation, check_protected, derive_notation, entity_violations};
use crate::registry::{EntityBody, ItemRequest, Register, RegisterItem, Status};

/// A registration prepared against a register snapshot, not yet committed
#[derive(Debug)]
pub(super) struct Staged {
    pub record: ItemRecord,
    /// Set when the entity is itself a register
    pub register: Option<Register>,
}

impl Staged {
    pub fn notation(&self) -> &str {
        &self.record.item.notation
    }

    pub fn item_uri(&self) -> &str {
        &self.record.item.uri
    }

    pub fn entity_uri(&self) -> &str {
        &self.record.item.entity_uri
    }

    /// Queue the staged versions and index entry
    pub fn stage_into(self, changes: &mut ChangeSet) {
        let kind = if self.record.version() == 1 {
            ChangeKind::Created
        } else {
            ChangeKind::Updated
        };
        changes.index(self.entity_uri().to_string(), self.item_uri().to_string());
        if let Some(register) = self.register {
            let kind = if register.version == 1 {
                ChangeKind::Created
            } else {
                ChangeKind::Updated
            };
            changes.register(register, kind);
        }
        changes.item(self.record, kind);
    }
}

/// Item label mirrors the entity label
fn sync_label(metadata: &mut EntityGraph, entity: &EntityGraph) {
    if let Some(label) = entity.label() {
        metadata.set(vocab::RDFS_LABEL, Value::text(label));
    }
}

fn declared_types(entity: &EntityGraph) -> Vec<String> {
    entity.types().into_iter().map(str::to_string).collect()
}

impl Store {
    /// Validate a registration of `request` into `parent` and build the
    /// versions it would commit. `pending` holds item and entity URIs
    /// already claimed by earlier candidates of the same batch.
    pub(super) fn stage_registration(
        &self,
        state: &State,
        parent: &Register,
        request: &ItemRequest,
        at: DateTime<Utc>,
        pending: &HashSet<String>,
    ) -> RegistryResult<Staged> {
        check_protected(&request.entity)?;
        if let Some(metadata) = &request.metadata {
            check_protected(metadata)?;
        }

        let notation = derive_notation(request);
        check_notation(&notation).map_err(|v| RegistryError::Validation(vec![v]))?;
        let item_uri = parent.item_uri_for(&notation);
        let managed_uri = parent.child_uri(&notation);

        let mut entity = request.entity.clone();
        if request.wants_managed_uri() {
            entity.set_uri(managed_uri.clone());
        }
        let is_register = entity.has_type(vocab::REG_REGISTER);
        if is_register {
            if entity.uri() != managed_uri {
                return Err(RegistryError::validation(
                    entity.uri(),
                    format!("register '{}' must have URI <{}>", notation, managed_uri),
                ));
            }
            if entity.has_property(vocab::REG_MEMBER) {
                return Err(RegistryError::forbidden(format!(
                    "membership of <{}> is managed by the registry",
                    managed_uri
                )));
            }
        }

        let previous = state.current_item(&item_uri).ok();
        let taken = match &previous {
            Some(p) => p.item.is_live(),
            None => parent.members.contains_key(&notation),
        };
        if taken || pending.contains(&item_uri) {
            return Err(RegistryError::conflict(format!(
                "notation '{}' is already registered in <{}>",
                notation, parent.uri
            )));
        }
        if state.entities.contains_key(&item_uri) || state.registers.contains_key(&item_uri) {
            return Err(RegistryError::conflict(format!(
                "item URI <{}> is already in use by another resource",
                item_uri
            )));
        }
        let owner_live = state
            .entities
            .get(entity.uri())
            .filter(|owner| **owner != item_uri)
            .and_then(|owner| state.current_item(owner).ok())
            .map_or(false, |r| r.item.is_live());
        if owner_live || pending.contains(entity.uri()) || state.items.contains_key(entity.uri()) {
            return Err(RegistryError::conflict(format!(
                "entity <{}> is already registered",
                entity.uri()
            )));
        }

        let violations = entity_violations(&entity, parent, self.validator.as_ref());
        if !violations.is_empty() {
            return Err(RegistryError::Validation(violations));
        }

        let mut metadata = request
            .metadata
            .clone()
            .unwrap_or_else(|| EntityGraph::new(item_uri.clone()));
        metadata.set_uri(item_uri.clone());
        sync_label(&mut metadata, &entity);

        let item = RegisterItem {
            uri: item_uri.clone(),
            notation,
            register: parent.uri.clone(),
            status: if request.reserved {
                Status::Reserved
            } else {
                Status::Submitted
            },
            version: state.items.get(&item_uri).map_or(0, |c| c.len() as u64) + 1,
            submitted: at,
            accepted: None,
            modified: at,
            metadata,
            entity_uri: entity.uri().to_string(),
            item_class: declared_types(&entity),
            entity: None,
            annotations: BTreeMap::new(),
        };

        if is_register {
            let register_uri = entity.uri().to_string();
            let mut register = Register::new(register_uri, entity);
            if let Ok(existing) = state.current_register(&register.uri) {
                register.members = existing.members.clone();
                register.version = existing.version + 1;
            } else {
                register.version = 1;
            }
            register.item_uri = Some(item_uri);
            register.constraints = request.constraints.clone();
            Ok(Staged {
                record: ItemRecord::new(item, EntityBody::Register),
                register: Some(register),
            })
        } else {
            Ok(Staged {
                record: ItemRecord::new(item, EntityBody::Owned(entity)),
                register: None,
            })
        }
    }

    /// Fail if the item behind a register has been invalidated
    pub(super) fn ensure_register_open(state: &State, register: &Register) -> RegistryResult<()> {
        if let Some(item_uri) = &register.item_uri {
            if !state.current_item(item_uri)?.item.is_live() {
                return Err(RegistryError::forbidden(format!(
                    "register <{}> is invalid",
                    register.uri
                )));
            }
        }
        Ok(())
    }

    /// Register a new item in `parent`.
    ///
    /// Commits the item's first version (Submitted, or Reserved for a
    /// reservation) and a new version of the parent together.
    pub fn add_to_register(&self, parent: &str, request: ItemRequest) -> RegistryResult<RegisterItem> {
        let parent_uri = self.read_state()?.resolve_register_uri(parent)?;
        let _guard = self
            .locks
            .acquire(&parent_uri)
            .map_err(|e| self.rejected("add_to_register", &parent_uri, e))?;

        self.register_locked(&parent_uri, &request)
            .map_err(|e| self.rejected("add_to_register", &parent_uri, e))
    }

    fn register_locked(&self, parent_uri: &str, request: &ItemRequest) -> RegistryResult<RegisterItem> {
        let at = self.clock.now();
        let (staged, parent) = {
            let state = self.read_state()?;
            let parent = state.current_register(parent_uri)?;
            Self::ensure_register_open(&state, &parent)?;
            let staged = self.stage_registration(&state, &parent, request, at, &HashSet::new())?;
            (staged, parent)
        };

        let mut next_parent = parent.as_ref().clone();
        next_parent
            .members
            .insert(staged.notation().to_string(), staged.item_uri().to_string());
        next_parent.version += 1;

        let item = staged.record.item.clone();
        let mut changes = ChangeSet::new();
        staged.stage_into(&mut changes);
        changes.register(next_parent, ChangeKind::Updated);
        self.commit(changes, at)?;

        log_event_with_fields(
            Event::ItemRegistered,
            &[
                ("uri", &item.uri),
                ("register", parent_uri),
                ("status", item.status.as_str()),
                ("version", &item.version.to_string()),
            ],
        );
        Ok(item)
    }

    /// Write a new version of an item's entity.
    ///
    /// The caller must hold the item's lock (see [`Store::lock`]).
    /// `replace_entity` replaces the payload wholesale; otherwise every
    /// property present in `entity` overwrites the current values and the
    /// rest are kept. An empty entity URI keeps the current identity.
    pub fn update(
        &self,
        guard: &LockGuard<'_>,
        uri: &str,
        entity: EntityGraph,
        replace_entity: bool,
    ) -> RegistryResult<RegisterItem> {
        self.revise_entity(guard, uri, "update", |current| {
            check_protected(&entity)?;
            let mut next = if replace_entity {
                entity.clone()
            } else {
                current.merge(&entity)
            };
            if entity.uri().is_empty() {
                next.set_uri(current.uri());
            } else {
                next.set_uri(entity.uri());
            }
            Ok(next)
        })
    }

    /// Apply an add/remove diff to an item's entity under the caller's lock
    pub fn patch(&self, guard: &LockGuard<'_>, uri: &str, patch: &GraphPatch) -> RegistryResult<RegisterItem> {
        self.revise_entity(guard, uri, "patch", |current| {
            if let Some(p) = patch.properties().find(|p| vocab::is_protected(p)) {
                return Err(RegistryError::forbidden(format!(
                    "<{}> is managed by the registry",
                    p
                )));
            }
            Ok(patch.apply(current))
        })
    }

    fn revise_entity<F>(
        &self,
        guard: &LockGuard<'_>,
        uri: &str,
        operation: &str,
        revise: F,
    ) -> RegistryResult<RegisterItem>
    where
        F: FnOnce(&EntityGraph) -> RegistryResult<EntityGraph>,
    {
        let item_uri = self.read_state()?.resolve_item_uri(uri)?;
        guard.ensure_covers(&item_uri)?;
        self.revise_locked(&item_uri, revise)
            .map_err(|e| self.rejected(operation, &item_uri, e))
    }

    fn revise_locked<F>(&self, item_uri: &str, revise: F) -> RegistryResult<RegisterItem>
    where
        F: FnOnce(&EntityGraph) -> RegistryResult<EntityGraph>,
    {
        let at = self.clock.now();
        let mut changes = ChangeSet::new();
        let next = {
            let state = self.read_state()?;
            let current = state.current_item(item_uri)?;
            if !current.item.is_live() {
                return Err(RegistryError::forbidden(format!("item <{}> is invalid", item_uri)));
            }
            let entity = match &current.body {
                EntityBody::Owned(g) => g,
                EntityBody::Register => {
                    return Err(RegistryError::forbidden(format!(
                        "<{}> describes a register; use update_register",
                        item_uri
                    )))
                }
                EntityBody::Reference => {
                    return Err(RegistryError::forbidden(format!(
                        "<{}> references an entity owned by another item",
                        item_uri
                    )))
                }
            };

            let revised = revise(entity)?;
            if revised.uri() != current.item.entity_uri {
                if current.item.identity_fixed() {
                    return Err(RegistryError::validation(
                        &current.item.entity_uri,
                        format!(
                            "entity URI cannot change once accepted (status {})",
                            current.item.status
                        ),
                    ));
                }
                if state.entities.contains_key(revised.uri()) || state.items.contains_key(revised.uri()) {
                    return Err(RegistryError::conflict(format!(
                        "entity <{}> is already registered",
                        revised.uri()
                    )));
                }
                changes.unindex(current.item.entity_uri.clone());
                changes.index(revised.uri().to_string(), item_uri.to_string());
            }

            let parent = state.current_register(&current.item.register)?;
            let violations = entity_violations(&revised, &parent, self.validator.as_ref());
            if !violations.is_empty() {
                return Err(RegistryError::Validation(violations));
            }

            let mut next = current.successor();
            next.item.modified = at;
            next.item.entity_uri = revised.uri().to_string();
            next.item.item_class = declared_types(&revised);
            sync_label(&mut next.item.metadata, &revised);
            next.body = EntityBody::Owned(revised);
            next
        };

        let item = next.item.clone();
        changes.item(next, ChangeKind::Updated);
        self.commit(changes, at)?;
        log_event_with_fields(
            Event::ItemUpdated,
            &[("uri", item_uri), ("version", &item.version.to_string())],
        );
        Ok(item)
    }

    /// Status update from a token such as `stable` or `statusStable`
    pub fn update_status(&self, uri: &str, token: &str) -> RegistryResult<RegisterItem> {
        let status: Status = token
            .parse()
            .map_err(|e| self.rejected("update_status", uri, e))?;
        self.set_status(uri, status)
    }

    /// Move an item to `status` along a legal edge of the lifecycle
    pub fn set_status(&self, uri: &str, status: Status) -> RegistryResult<RegisterItem> {
        let guard = self.lock(uri)?;
        let item_uri = guard.target().to_string();
        self.transition_locked(&item_uri, status)
            .map_err(|e| self.rejected("set_status", &item_uri, e))
    }

    fn transition_locked(&self, item_uri: &str, status: Status) -> RegistryResult<RegisterItem> {
        let at = self.clock.now();
        let current = self.current_record(item_uri)?;
        current.item.status.transition(status)?;

        let mut next = current.successor();
        next.item.status = status;
        next.item.modified = at;
        if next.item.accepted.is_none() && status.stamps_acceptance() {
            next.item.accepted = Some(at);
        }
        let item = next.item.clone();
        let kind = if status == Status::Invalid {
            ChangeKind::Deleted
        } else {
            ChangeKind::StatusChanged
        };
        let mut changes = ChangeSet::new();
        changes.item(next, kind);
        self.commit(changes, at)?;

        let event = if status == Status::Invalid {
            Event::ItemDeleted
        } else {
            Event::StatusChanged
        };
        log_event_with_fields(
            event,
            &[
                ("uri", item_uri),
                ("from", current.item.status.as_str()),
                ("to", status.as_str()),
                ("version", &item.version.to_string()),
            ],
        );
        Ok(item)
    }

    /// Logically delete an item by moving it to Invalid.
    ///
    /// Deleting a register invalidates every live member, recursively,
    /// taking each member's lock in turn while the register stays locked.
    /// Already-invalid items are skipped, so repeating a delete that was
    /// interrupted completes it. Returns the item URIs invalidated by this
    /// call.
    pub fn delete(&self, uri: &str) -> RegistryResult<Vec<String>> {
        let item_uri = self.read_state()?.resolve_item_uri(uri)?;
        let mut invalidated = Vec::new();
        self.delete_item(&item_uri, true, &mut invalidated)
            .map_err(|e| self.rejected("delete", &item_uri, e))?;
        Ok(invalidated)
    }

    fn delete_item(&self, item_uri: &str, top_level: bool, invalidated: &mut Vec<String>) -> RegistryResult<()> {
        let record = self.current_record(item_uri)?;
        let register_uri = matches!(record.body, EntityBody::Register)
            .then(|| record.item.entity_uri.clone());

        // membership is frozen for the whole cascade
        let _register_guard = match &register_uri {
            Some(r) => Some(self.locks.acquire(r)?),
            None => None,
        };

        {
            let _item_guard = self.locks.acquire(item_uri)?;
            let current = self.current_record(item_uri)?;
            match current.item.status {
                Status::Invalid => {}
                // Reserved -> Invalid is not an edge; members are left as they are
                Status::Reserved if !top_level => {
                    tracing::debug!(uri = item_uri, "reserved member skipped by cascade");
                    return Ok(());
                }
                _ => {
                    self.transition_locked(item_uri, Status::Invalid)?;
                    invalidated.push(item_uri.to_string());
                }
            }
        }

        if let Some(register_uri) = register_uri {
            let members: Vec<String> = self
                .read_state()?
                .current_register(&register_uri)?
                .members
                .values()
                .cloned()
                .collect();
            for member in members {
                self.delete_item(&member, false, invalidated)?;
            }
        }
        Ok(())
    }

    /// Patch a register's description. Membership and the contained item
    /// class are managed by the registry and cannot be patched.
    pub fn update_register(&self, uri: &str, patch: &GraphPatch) -> RegistryResult<Register> {
        let register_uri = self.read_state()?.resolve_register_uri(uri)?;
        let _guard = self
            .locks
            .acquire(&register_uri)
            .map_err(|e| self.rejected("update_register", &register_uri, e))?;
        self.update_register_locked(&register_uri, patch)
            .map_err(|e| self.rejected("update_register", &register_uri, e))
    }

    fn update_register_locked(&self, register_uri: &str, patch: &GraphPatch) -> RegistryResult<Register> {
        const FIXED: &[&str] = &[vocab::REG_MEMBER, vocab::REG_CONTAINED_ITEM_CLASS];
        if let Some(p) = patch
            .properties()
            .find(|p| FIXED.contains(p) || vocab::is_protected(p))
        {
            return Err(RegistryError::forbidden(format!(
                "<{}> of <{}> cannot be patched",
                p, register_uri
            )));
        }

        let at = self.clock.now();
        let current = {
            let state = self.read_state()?;
            let current = state.current_register(register_uri)?;
            Self::ensure_register_open(&state, &current)?;
            current
        };
        let mut description = patch.apply(&current.description);
        description.set_uri(register_uri);
        if description.label().is_none() {
            return Err(RegistryError::validation(register_uri, "a label is required"));
        }
        if description.types().is_empty() {
            return Err(RegistryError::validation(
                register_uri,
                "a type declaration is required",
            ));
        }

        let mut next = current.as_ref().clone();
        next.description = description;
        next.version += 1;
        let mut changes = ChangeSet::new();
        changes.register(next.clone(), ChangeKind::Updated);
        self.commit(changes, at)?;
        log_event_with_fields(
            Event::ItemUpdated,
            &[("uri", register_uri), ("version", &next.version.to_string())],
        );
        Ok(next)
    }

    /// Attach or replace a named annotation graph; creates a new item version
    pub fn set_annotation(&self, uri: &str, name: &str, annotation: EntityGraph) -> RegistryResult<RegisterItem> {
        let guard = self.lock(uri)?;
        let item_uri = guard.target().to_string();
        self.annotate_locked(&item_uri, name, annotation)
            .map_err(|e| self.rejected("set_annotation", &item_uri, e))
    }

    fn annotate_locked(&self, item_uri: &str, name: &str, annotation: EntityGraph) -> RegistryResult<RegisterItem> {
        check_notation(name).map_err(|v| RegistryError::Validation(vec![v]))?;
        check_protected(&annotation)?;
        let at = self.clock.now();
        let current = self.current_record(item_uri)?;
        if !current.item.is_live() {
            return Err(RegistryError::forbidden(format!("item <{}> is invalid", item_uri)));
        }

        let mut annotation = annotation;
        annotation.set_uri(format!("{}?annotation={}", item_uri, name));
        let mut next = current.successor();
        next.item.modified = at;
        next.item.annotations.insert(name.to_string(), annotation);
        let item = next.item.clone();

        let mut changes = ChangeSet::new();
        changes.item(next, ChangeKind::Updated);
        self.commit(changes, at)?;
        log_event_with_fields(Event::AnnotationSet, &[("uri", item_uri), ("name", name)]);
        Ok(item)
    }

    /// Current annotation `name` of an item
    pub fn annotation(&self, uri: &str, name: &str) -> RegistryResult<EntityGraph> {
        let item = self.get_item(uri, false)?;
        item.annotations
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(format!("annotation '{}' on <{}>", name, item.uri)))
    }
}
