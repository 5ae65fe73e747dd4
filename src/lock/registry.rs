//! Per-target exclusive locks
//!
//! - One slot per locked resource URI, created on first acquisition
//! - A slot is dropped once no guard holds it and nobody waits on it,
//!   so the table is bounded by in-flight operations
//! - Acquisition waits at most the configured timeout, then fails Busy
//! - Re-acquiring a target already held by the current thread fails
//!   immediately instead of deadlocking

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crate::errors::{RegistryError, RegistryResult};
use crate::observability::{log_event_with_fields, Event};

#[derive(Debug, Default)]
struct Slot {
    /// Thread currently holding the lock
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

/// Lock table keyed by resource URI
#[derive(Debug)]
pub struct LockRegistry {
    slots: Mutex<HashMap<String, Arc<Slot>>>,
    timeout: Duration,
}

impl LockRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn table(&self) -> RegistryResult<MutexGuard<'_, HashMap<String, Arc<Slot>>>> {
        self.slots
            .lock()
            .map_err(|_| RegistryError::internal("lock table poisoned"))
    }

    /// Acquire the exclusive lock on `target`.
    ///
    /// The returned guard releases the lock when dropped, on every path.
    pub fn acquire(&self, target: &str) -> RegistryResult<LockGuard<'_>> {
        let slot = {
            let mut table = self.table()?;
            Arc::clone(table.entry(target.to_string()).or_default())
        };

        let me = thread::current().id();
        let started = Instant::now();
        let outcome = (|| {
            let owner = slot
                .owner
                .lock()
                .map_err(|_| RegistryError::internal("lock slot poisoned"))?;
            if *owner == Some(me) {
                return Err(RegistryError::internal(format!(
                    "nested acquisition of {}",
                    target
                )));
            }
            let (mut owner, _) = slot
                .released
                .wait_timeout_while(owner, self.timeout, |o| o.is_some())
                .map_err(|_| RegistryError::internal("lock slot poisoned"))?;
            if owner.is_some() {
                return Err(RegistryError::Busy {
                    target: target.to_string(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            *owner = Some(me);
            Ok(())
        })();

        match outcome {
            Ok(()) => Ok(LockGuard {
                registry: self,
                target: target.to_string(),
                slot,
            }),
            Err(err) => {
                if matches!(err, RegistryError::Busy { .. }) {
                    log_event_with_fields(Event::LockTimeout, &[("target", target)]);
                }
                self.forget_if_idle(target, &slot);
                Err(err)
            }
        }
    }

    /// Drop the slot if only the table and the caller reference it
    fn forget_if_idle(&self, target: &str, slot: &Arc<Slot>) {
        if let Ok(mut table) = self.table() {
            if Arc::strong_count(slot) == 2 {
                let idle = slot.owner.lock().map(|o| o.is_none()).unwrap_or(false);
                if idle {
                    table.remove(target);
                }
            }
        }
    }

    /// True if some operation currently holds `target`
    pub fn is_locked(&self, target: &str) -> bool {
        let slot = match self.table() {
            Ok(table) => table.get(target).cloned(),
            Err(_) => None,
        };
        slot.map_or(false, |s| s.owner.lock().map(|o| o.is_some()).unwrap_or(false))
    }

    /// Number of live slots (held or waited on)
    pub fn slot_count(&self) -> usize {
        self.table().map(|t| t.len()).unwrap_or(0)
    }
}

/// Proof that the holder owns the lock on one target
#[derive(Debug)]
pub struct LockGuard<'a> {
    registry: &'a LockRegistry,
    target: String,
    slot: Arc<Slot>,
}

impl LockGuard<'_> {
    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Check the guard protects `target`
    pub fn ensure_covers(&self, target: &str) -> RegistryResult<()> {
        if self.target == target {
            Ok(())
        } else {
            Err(RegistryError::internal(format!(
                "operation on {} requires its lock, caller holds {}",
                target, self.target
            )))
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut owner) = self.slot.owner.lock() {
            *owner = None;
        }
        self.slot.released.notify_one();
        self.registry.forget_if_idle(&self.target, &self.slot);
    }
}
