//! Read-through cache invalidated by change events
//!
//! Entries are keyed by resource URI. An event for `uri` drops the entry
//! for `uri` and every entry keyed by an ancestor of `uri`, since a change
//! to a member changes its register's listing. Invalidation is
//! asynchronous: a read racing a commit may see the previous value until
//! the event is dispatched.
//!
//! Every invalidation bumps a generation counter. A value loaded on a miss
//! is stored only if no invalidation happened while it was being loaded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::notifier::{ChangeNotifier, SubscriptionId};
use crate::errors::{RegistryError, RegistryResult};

#[derive(Debug)]
pub struct InvalidatingCache<V> {
    entries: Arc<RwLock<HashMap<String, V>>>,
    /// Bumped under the entries write lock by every invalidation
    generation: Arc<AtomicU64>,
    subscription: SubscriptionId,
}

impl<V> InvalidatingCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache invalidated by events under `prefix`
    pub fn attach(notifier: &ChangeNotifier, prefix: &str) -> RegistryResult<Self> {
        let entries: Arc<RwLock<HashMap<String, V>>> = Arc::new(RwLock::new(HashMap::new()));
        let generation = Arc::new(AtomicU64::new(0));
        let target = Arc::clone(&entries);
        let bumped = Arc::clone(&generation);
        let subscription = notifier.subscribe(prefix, move |event| {
            if let Ok(mut map) = target.write() {
                map.retain(|key, _| !invalidated_by(key, &event.uri));
                bumped.fetch_add(1, Ordering::SeqCst);
            }
        })?;
        Ok(Self {
            entries,
            generation,
            subscription,
        })
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.read().ok()?.get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        if let Ok(mut map) = self.entries.write() {
            map.insert(key.into(), value);
        }
    }

    /// Cached value for `key`, computing it on a miss.
    ///
    /// The computed value is returned either way, but it is only stored if
    /// no invalidation arrived while `load` ran.
    pub fn get_or_insert_with<F>(&self, key: &str, load: F) -> RegistryResult<V>
    where
        F: FnOnce() -> RegistryResult<V>,
    {
        if let Some(v) = self.get(key) {
            return Ok(v);
        }
        let seen = self.generation.load(Ordering::SeqCst);
        let value = load()?;
        let mut map = self
            .entries
            .write()
            .map_err(|_| RegistryError::internal("Lock poisoned"))?;
        if self.generation.load(Ordering::SeqCst) == seen {
            map.insert(key.to_string(), value.clone());
        }
        Ok(value)
    }

    /// Number of invalidation events applied so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop receiving invalidations
    pub fn detach(&self, notifier: &ChangeNotifier) -> bool {
        notifier.unsubscribe(self.subscription)
    }
}

fn invalidated_by(key: &str, changed: &str) -> bool {
    if key == changed {
        return true;
    }
    match changed.strip_prefix(key) {
        Some(rest) => key.ends_with('/') || rest.starts_with('/'),
        None => false,
    }
}
