//! Register and RegisterItem domain
//!
//! - `Status` / `StatusFilter` - closed lifecycle with explicit transitions
//! - `RegisterItem` - versioned wrapper around one entity
//! - `Register` - notation -> item mapping plus member constraints
//! - `ItemRequest` - registration candidate
//! - `Tag` - named capture of register membership
//! - `rules` - identity and entity checks applied before writes

mod item;
mod register;
mod request;
pub mod rules;
mod status;
mod tag;

pub use item::{EntityBody, RegisterItem};
pub use register::{child_uri, sort_notations, MemberSummary, Register};
pub use request::ItemRequest;
pub use status::{Status, StatusFilter};
pub use tag::Tag;
