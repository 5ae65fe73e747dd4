//! Tags - named, immutable captures of register membership

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub name: String,
    /// Register the capture was taken from
    pub register: String,
    /// Register version at capture time
    pub register_version: u64,
    pub created: DateTime<Utc>,
    /// Version URIs of the captured members, in listing order
    pub members: Vec<String>,
}

impl Tag {
    pub fn uri(&self) -> String {
        format!("{}?tag={}", self.register, self.name)
    }
}
