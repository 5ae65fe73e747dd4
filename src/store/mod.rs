//! # Store
//!
//! The versioned registry store. Orchestrates version chains, per-resource
//! locks, lifecycle rules and change notification.
//!
//! - Every write runs under the lock of the resource it mutates and
//!   commits its versions atomically
//! - Reads are lock-free with respect to writers and see whole versions
//! - Events are published after commit and never delay it

mod batch;
mod bootstrap;
mod clock;
mod config;
mod engine;
mod lifecycle;
mod listing;
mod records;
mod state;

pub use batch::{BatchMembers, BatchOutcome, BatchRequest};
pub use bootstrap::{Bootstrap, BootstrapEntry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::StoreConfig;
pub use engine::{ReadResult, ReadView, Store};
pub use listing::MemberIter;
