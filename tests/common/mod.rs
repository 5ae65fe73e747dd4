//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use regstore::graph::vocab;
use regstore::store::{ManualClock, Store, StoreConfig};
use regstore::{EntityGraph, ItemRequest, RegisterItem};

pub const ROOT: &str = "http://example.com/";
pub const REG1: &str = "http://example.com/reg1";
pub const CONCEPT: &str = "http://www.w3.org/2004/02/skos/core#Concept";

/// Fixed instant `secs` seconds after the test epoch
pub fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn config() -> StoreConfig {
    StoreConfig::new(ROOT).with_notifier(false)
}

/// Store with a root register, driven by a manual clock starting at t(-100)
pub fn store_with(config: StoreConfig) -> (Store, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(t(-100)));
    let store = Store::open(config).unwrap().with_clock(clock.clone());
    store
        .create_root(EntityGraph::new("").labelled("root"))
        .unwrap();
    (store, clock)
}

pub fn store() -> (Store, Arc<ManualClock>) {
    store_with(config())
}

pub fn concept(label: &str) -> EntityGraph {
    EntityGraph::new("").labelled(label).typed(CONCEPT)
}

pub fn register_entity(label: &str) -> EntityGraph {
    EntityGraph::new("").labelled(label).typed(vocab::REG_REGISTER)
}

/// Register `reg1` in the root and return its item
pub fn add_reg1(store: &Store) -> RegisterItem {
    store
        .add_to_register(ROOT, ItemRequest::new(register_entity("reg1")).with_notation("reg1"))
        .unwrap()
}

pub fn add_concept(store: &Store, register: &str, notation: &str) -> RegisterItem {
    store
        .add_to_register(register, ItemRequest::new(concept(notation)).with_notation(notation))
        .unwrap()
}

pub fn short_timeout() -> StoreConfig {
    config().with_lock_timeout(Duration::from_millis(50))
}
