//! Observable registry events
//!
//! Events are explicit and typed. Each maps to a stable upper-case name
//! and a log level.

use std::fmt;

use tracing::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Store constructed
    StoreOpened,
    /// Configuration loaded from disk
    ConfigLoaded,
    /// Root register and seed entries created
    BootstrapLoaded,

    // Writes
    /// New item committed into a register
    ItemRegistered,
    /// Item or register payload superseded
    ItemUpdated,
    /// Status transition committed
    StatusChanged,
    /// Item moved to Invalid
    ItemDeleted,
    /// Register membership captured as a tag
    RegisterTagged,
    /// Annotation graph attached
    AnnotationSet,
    /// Bulk registration committed
    BatchRegistered,
    /// Write rejected before commit
    WriteRejected,

    // Locking
    /// Lock not acquired within the configured bound
    LockTimeout,

    // Notification
    /// Change dispatcher started
    DispatcherStarted,
    /// Change dispatcher drained and stopped
    DispatcherStopped,
    /// A listener callback panicked
    ListenerPanicked,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::StoreOpened => "STORE_OPENED",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::BootstrapLoaded => "BOOTSTRAP_LOADED",
            Event::ItemRegistered => "ITEM_REGISTERED",
            Event::ItemUpdated => "ITEM_UPDATED",
            Event::StatusChanged => "STATUS_CHANGED",
            Event::ItemDeleted => "ITEM_DELETED",
            Event::RegisterTagged => "REGISTER_TAGGED",
            Event::AnnotationSet => "ANNOTATION_SET",
            Event::BatchRegistered => "BATCH_REGISTERED",
            Event::WriteRejected => "WRITE_REJECTED",
            Event::LockTimeout => "LOCK_TIMEOUT",
            Event::DispatcherStarted => "DISPATCHER_STARTED",
            Event::DispatcherStopped => "DISPATCHER_STOPPED",
            Event::ListenerPanicked => "LISTENER_PANICKED",
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Event::ListenerPanicked => Level::ERROR,
            Event::LockTimeout | Event::WriteRejected => Level::WARN,
            Event::DispatcherStarted | Event::DispatcherStopped => Level::DEBUG,
            _ => Level::INFO,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
