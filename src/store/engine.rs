//! Store - orchestration over version chains, locks and notification
//!
//! Reads never take a resource lock. They clone the snapshots they need
//! under a short shared guard and work on those copies.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use super::clock::{Clock, SystemClock};
use super::config::StoreConfig;
use super::records::ItemRecord;
use super::state::{ChangeSet, State};
use crate::errors::{RegistryError, RegistryResult};
use crate::graph::{vocab, EntityGraph};
use crate::lock::{LockGuard, LockRegistry};
use crate::notify::{ChangeKind, ChangeNotifier};
use crate::observability::{log_event_with_fields, Event, MetricsSnapshot, StoreMetrics};
use crate::registry::{Register, RegisterItem};
use crate::validation::{ConstraintValidator, ShapeValidator};
use crate::version::{split_version_uri, VersionInfo, VersionSelector};

/// Which parts of a resource a read returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadView {
    /// Item metadata only
    Metadata,
    /// Entity payload only
    Entity,
    /// Both
    WithMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    pub metadata: Option<EntityGraph>,
    pub entity: Option<EntityGraph>,
}

pub struct Store {
    pub(super) config: StoreConfig,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) validator: Arc<dyn ConstraintValidator>,
    pub(super) locks: LockRegistry,
    pub(super) state: RwLock<State>,
    pub(super) notifier: ChangeNotifier,
    pub(super) metrics: Arc<StoreMetrics>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("root", &self.config.root_uri)
            .field("clock", &self.clock)
            .field("notifier", &self.notifier)
            .finish()
    }
}

impl Store {
    /// Open an empty store. The root register is created by
    /// [`Store::create_root`] or [`Store::bootstrap`].
    pub fn open(config: StoreConfig) -> RegistryResult<Self> {
        config.validate()?;
        let metrics = Arc::new(StoreMetrics::new());
        let notifier = if config.notifier_enabled {
            ChangeNotifier::start(Arc::clone(&metrics))?
        } else {
            ChangeNotifier::disabled(Arc::clone(&metrics))
        };
        log_event_with_fields(
            Event::StoreOpened,
            &[
                ("root", &config.root_uri),
                ("lock_timeout_ms", &config.lock_timeout_ms.to_string()),
            ],
        );
        Ok(Self {
            locks: LockRegistry::new(config.lock_timeout()),
            clock: Arc::new(SystemClock::new()),
            validator: Arc::new(ShapeValidator),
            state: RwLock::new(State::default()),
            notifier,
            metrics,
            config,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn ConstraintValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn root_uri(&self) -> &str {
        &self.config.root_uri
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(super) fn read_state(&self) -> RegistryResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| RegistryError::internal("Lock poisoned"))
    }

    fn write_state(&self) -> RegistryResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| RegistryError::internal("Lock poisoned"))
    }

    /// Create the root register (version 1, no item)
    pub fn create_root(&self, description: EntityGraph) -> RegistryResult<VersionInfo> {
        let root = self.config.root_uri.clone();
        let _guard = self.locks.acquire(&root)?;
        let mut description = description;
        description.set_uri(root.clone());
        if description.label().is_none() {
            return Err(RegistryError::validation(&root, "a label is required"));
        }
        if !description.has_type(vocab::REG_REGISTER) {
            description.add(vocab::RDF_TYPE, crate::graph::Value::uri(vocab::REG_REGISTER));
        }
        if self.read_state()?.registers.contains_key(&root) {
            return Err(RegistryError::conflict(format!("root register <{}> already exists", root)));
        }
        let mut register = Register::new(root.clone(), description);
        register.version = 1;
        let at = self.clock.now();
        let mut changes = ChangeSet::new();
        changes.register(register, ChangeKind::Created);
        self.commit(changes, at)?;
        self.read_state()?
            .registers
            .get(&root)
            .map(|c| c.list_versions())
            .and_then(|v| v.into_iter().next())
            .ok_or_else(|| RegistryError::internal("root register missing after commit"))
    }

    /// Apply a change set and publish its events
    pub(super) fn commit(&self, changes: ChangeSet, at: DateTime<Utc>) -> RegistryResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let versions = changes.version_count();
        let events = {
            let mut state = self.write_state()?;
            state.apply(changes, at)?
        };
        self.metrics.record_commit(versions);
        for (uri, kind) in events {
            self.notifier.publish(&uri, kind);
        }
        Ok(())
    }

    /// Count and log a rejected write
    pub(super) fn rejected(&self, operation: &str, uri: &str, err: RegistryError) -> RegistryError {
        self.metrics.record_rejection(&err);
        log_event_with_fields(
            Event::WriteRejected,
            &[
                ("operation", operation),
                ("uri", uri),
                ("code", err.code()),
                ("reason", &err.to_string()),
            ],
        );
        err
    }

    /// Acquire the exclusive lock on the item behind `uri`.
    ///
    /// Item, entity and register URIs all resolve to the item's lock.
    pub fn lock(&self, uri: &str) -> RegistryResult<LockGuard<'_>> {
        let target = self.read_state()?.resolve_item_uri(uri)?;
        self.locks
            .acquire(&target)
            .map_err(|e| self.rejected("lock", &target, e))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current item for an item, entity or register URI. A version URI
    /// (`<uri>:<n>`) selects that version instead.
    pub fn get_item(&self, uri: &str, with_entity: bool) -> RegistryResult<RegisterItem> {
        if let (base, Some(n)) = split_version_uri(uri) {
            let state = self.read_state()?;
            if state.resolve_item_uri(base).is_ok() {
                drop(state);
                return self.get_version(base, VersionSelector::Number(n));
            }
        }
        let state = self.read_state()?;
        let item_uri = state.resolve_item_uri(uri)?;
        let record = state.current_item(&item_uri)?;
        Ok(state.materialize(&record, with_entity, None))
    }

    /// Historical item snapshot, always with its entity
    pub fn get_version(&self, uri: &str, selector: VersionSelector) -> RegistryResult<RegisterItem> {
        let state = self.read_state()?;
        let item_uri = state.resolve_item_uri(uri)?;
        let chain = state
            .items
            .get(&item_uri)
            .ok_or_else(|| RegistryError::not_found(format!("item <{}>", item_uri)))?;
        let version = chain.select(selector)?;
        let record = version.snapshot();
        let at = if version.info().is_current() {
            None
        } else {
            Some(version.info().from)
        };
        Ok(state.materialize(&record, true, at))
    }

    /// Current register snapshot for a register or register item URI
    pub fn get_register(&self, uri: &str) -> RegistryResult<Register> {
        let state = self.read_state()?;
        let register_uri = state.resolve_register_uri(uri)?;
        Ok(state.current_register(&register_uri)?.as_ref().clone())
    }

    /// Historical register snapshot
    pub fn get_register_version(&self, uri: &str, selector: VersionSelector) -> RegistryResult<Register> {
        let state = self.read_state()?;
        let register_uri = state.resolve_register_uri(uri)?;
        let chain = state
            .registers
            .get(&register_uri)
            .ok_or_else(|| RegistryError::not_found(format!("register <{}>", register_uri)))?;
        Ok(chain.select(selector)?.snapshot().as_ref().clone())
    }

    /// Read `uri` as metadata, entity or both
    pub fn read(&self, uri: &str, view: ReadView) -> RegistryResult<ReadResult> {
        let state = self.read_state()?;

        // the root register has an entity but no item
        if uri == self.config.root_uri {
            let root = state.current_register(uri)?;
            if view == ReadView::Metadata {
                return Err(RegistryError::not_found(format!(
                    "<{}> is the root register and has no item",
                    uri
                )));
            }
            let entity = root.describe(&state.member_entities(&root, None));
            return Ok(ReadResult {
                metadata: None,
                entity: Some(entity),
            });
        }

        let item_uri = state.resolve_item_uri(uri)?;
        let record = state.current_item(&item_uri)?;
        let metadata = match view {
            ReadView::Metadata | ReadView::WithMetadata => Some(record.item.describe()),
            ReadView::Entity => None,
        };
        let entity = match view {
            ReadView::Entity | ReadView::WithMetadata => Some(state.entity_of(&record, None).ok_or_else(
                || RegistryError::not_found(format!("entity of <{}>", item_uri)),
            )?),
            ReadView::Metadata => None,
        };
        Ok(ReadResult { metadata, entity })
    }

    /// Version history, oldest first.
    ///
    /// Item and entity URIs give the item's history; a register URI gives
    /// the register's own history (description and membership).
    pub fn list_versions(&self, uri: &str) -> RegistryResult<Vec<VersionInfo>> {
        let state = self.read_state()?;
        if let Some(chain) = state.registers.get(uri) {
            return Ok(chain.list_versions());
        }
        let item_uri = state.resolve_item_uri(uri)?;
        state
            .items
            .get(&item_uri)
            .map(|c| c.list_versions())
            .ok_or_else(|| RegistryError::not_found(format!("item <{}>", item_uri)))
    }

    /// Item URI registered for an entity URI
    pub fn resolve_entity(&self, entity_uri: &str) -> RegistryResult<String> {
        self.read_state()?
            .entities
            .get(entity_uri)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(format!("entity <{}> is not registered", entity_uri)))
    }

    /// Succeeds iff every URI is a registered entity in an accepted status
    pub fn validate_registered(&self, uris: &[&str]) -> RegistryResult<()> {
        use crate::errors::Violation;

        let state = self.read_state()?;
        let mut violations = Vec::new();
        for uri in uris {
            let record = state
                .entities
                .get(*uri)
                .and_then(|item| state.current_item(item).ok());
            match record {
                None => violations.push(Violation::new(*uri, "not a registered entity")),
                Some(r) if !r.item.status.is_accepted() => violations.push(Violation::new(
                    *uri,
                    format!("registered with status {}, which is not accepted", r.item.status),
                )),
                Some(_) => {}
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::Validation(violations))
        }
    }

    /// Current snapshot of an item as stored
    pub(super) fn current_record(&self, item_uri: &str) -> RegistryResult<Arc<ItemRecord>> {
        self.read_state()?.current_item(item_uri)
    }
}
