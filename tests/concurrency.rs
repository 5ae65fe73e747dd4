//! Concurrency Tests
//!
//! - Writers to one item are serialized by its lock
//! - A waiter that cannot get a lock in time fails Busy
//! - Writers to distinct members of one register all land

mod common;

use std::sync::Barrier;
use std::thread;

use common::*;
use regstore::{EntityGraph, ErrorKind, Status, StatusFilter};

// =============================================================================
// Serialized writers
// =============================================================================

/// An update holding the lock commits before a concurrent delete.
#[test]
fn test_update_then_delete_serialized() {
    let (store, _clock) = store();
    add_reg1(&store);
    let red = add_concept(&store, REG1, "red");
    let barrier = Barrier::new(2);

    thread::scope(|s| {
        s.spawn(|| {
            let guard = store.lock(&red.uri).unwrap();
            barrier.wait();
            // give the deleter time to queue on the lock
            thread::sleep(std::time::Duration::from_millis(20));
            store
                .update(&guard, &red.uri, EntityGraph::new("").labelled("red2"), false)
                .unwrap();
        });
        s.spawn(|| {
            barrier.wait();
            store.delete(&red.uri).unwrap();
        });
    });

    let versions = store.list_versions(&red.uri).unwrap();
    assert_eq!(versions.len(), 3);
    let v2 = store.get_item(&format!("{}:2", red.uri), false).unwrap();
    assert_eq!(v2.label(), Some("red2"));
    assert_eq!(v2.status, Status::Submitted);
    let v3 = store.get_item(&red.uri, false).unwrap();
    assert_eq!(v3.status, Status::Invalid);
    assert_eq!(v3.label(), Some("red2"));
}

/// An update arriving after a delete is refused.
#[test]
fn test_delete_then_update_forbidden() {
    let (store, _clock) = store();
    add_reg1(&store);
    let red = add_concept(&store, REG1, "red");
    let barrier = Barrier::new(2);

    let result = thread::scope(|s| {
        s.spawn(|| {
            store.delete(&red.uri).unwrap();
            barrier.wait();
        });
        let updater = s.spawn(|| {
            barrier.wait();
            let guard = store.lock(&red.uri).unwrap();
            store.update(&guard, &red.uri, EntityGraph::new("").labelled("red2"), false)
        });
        updater.join().unwrap()
    });

    assert_eq!(result.unwrap_err().kind(), ErrorKind::Forbidden);
    assert_eq!(store.list_versions(&red.uri).unwrap().len(), 2);
}

// =============================================================================
// Lock timeouts
// =============================================================================

/// A writer blocked past the timeout fails Busy and is counted.
#[test]
fn test_lock_timeout_busy() {
    let (store, _clock) = store_with(short_timeout());
    add_reg1(&store);
    let red = add_concept(&store, REG1, "red");

    let guard = store.lock(&red.uri).unwrap();
    let result = thread::scope(|s| s.spawn(|| store.set_status(&red.uri, Status::Stable)).join().unwrap());
    drop(guard);

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);
    assert!(err.is_transient());
    assert_eq!(store.metrics().lock_timeouts, 1);

    // released locks are usable again
    store.set_status(&red.uri, Status::Stable).unwrap();
}

/// Taking a lock twice on one thread is refused rather than deadlocking.
#[test]
fn test_nested_lock_refused() {
    let (store, _clock) = store();
    add_reg1(&store);
    let red = add_concept(&store, REG1, "red");

    let _guard = store.lock(&red.uri).unwrap();
    let err = store.lock("http://example.com/reg1/red").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}

// =============================================================================
// Parallel registration
// =============================================================================

/// Concurrent registrations into one register all become members.
#[test]
fn test_parallel_registration() {
    let (store, _clock) = store();
    add_reg1(&store);

    thread::scope(|s| {
        for i in 0..8 {
            let store = &store;
            s.spawn(move || {
                add_concept(store, REG1, &format!("c{}", i));
            });
        }
    });

    let members: Vec<_> = store
        .list_members(REG1, StatusFilter::Any, None)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(members.len(), 8);
    assert_eq!(store.get_register(REG1).unwrap().version, 9);

    let versions = store.list_versions(REG1).unwrap();
    for pair in versions.windows(2) {
        assert!(pair[0].from < pair[1].from);
    }
}

/// Status changes on different items proceed independently.
#[test]
fn test_parallel_status_changes() {
    let (store, _clock) = store();
    add_reg1(&store);
    let items: Vec<_> = (0..6).map(|i| add_concept(&store, REG1, &format!("c{}", i))).collect();

    thread::scope(|s| {
        for item in &items {
            let store = &store;
            s.spawn(move || {
                store.set_status(&item.uri, Status::Experimental).unwrap();
                store.set_status(&item.uri, Status::Stable).unwrap();
            });
        }
    });

    let accepted = store
        .list_members(REG1, StatusFilter::Accepted, None)
        .unwrap()
        .count();
    assert_eq!(accepted, 6);
}
