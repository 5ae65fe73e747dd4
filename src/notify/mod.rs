//! # Change Notification
//!
//! Best-effort, post-commit fan-out of change events.
//!
//! Events are published only after a change set is visible to readers.
//! Collaborators such as caches subscribe by URI prefix; the store never
//! reaches into their state.

mod cache;
mod event;
mod notifier;

pub use cache::InvalidatingCache;
pub use event::{ChangeEvent, ChangeKind};
pub use notifier::{ChangeNotifier, DispatchResult, EventReceiver, SubscriptionId};
