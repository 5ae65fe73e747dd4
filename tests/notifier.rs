//! Change Notification Tests
//!
//! Events are published after commit, in commit order, to every listener
//! whose prefix matches the changed URI.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::*;
use regstore::notify::{ChangeKind, InvalidatingCache};
use regstore::{Status, Store};

fn notifying_store() -> Store {
    store_with(config().with_notifier(true)).0
}

/// Poll `done` until it holds or a second passes
fn eventually(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    done()
}

// =============================================================================
// Channel subscribers
// =============================================================================

/// A registration emits the item event, then the register event.
#[tokio::test]
async fn test_channel_receives_commit_events() {
    let store = notifying_store();
    add_reg1(&store);
    let (_id, mut rx) = store.notifier().subscribe_channel(REG1).unwrap();

    let red = add_concept(&store, REG1, "red");
    store.set_status(&red.uri, Status::Stable).unwrap();

    let mut received = Vec::new();
    for _ in 0..3 {
        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("event delivered in time")
            .expect("channel open");
        received.push(event);
    }

    assert_eq!(received[0].uri, red.uri);
    assert_eq!(received[0].kind, ChangeKind::Created);
    assert_eq!(received[1].uri, REG1);
    assert_eq!(received[1].kind, ChangeKind::Updated);
    assert_eq!(received[2].uri, red.uri);
    assert_eq!(received[2].kind, ChangeKind::StatusChanged);
    assert!(received[0].sequence < received[1].sequence);
    assert!(received[1].sequence < received[2].sequence);
}

/// Events outside the prefix are not delivered.
#[tokio::test]
async fn test_prefix_filtering() {
    let store = notifying_store();
    add_reg1(&store);
    let (_id, mut rx) = store
        .notifier()
        .subscribe_channel("http://example.com/reg1/_red")
        .unwrap();

    add_concept(&store, REG1, "blue");
    let red = add_concept(&store, REG1, "red");

    let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.uri, red.uri);
    assert!(rx.try_recv().is_err());
}

// =============================================================================
// Callback subscribers
// =============================================================================

/// Deletes are reported as Deleted; unsubscribed callbacks stop firing.
#[test]
fn test_callback_delivery_and_unsubscribe() {
    let store = notifying_store();
    add_reg1(&store);
    let red = add_concept(&store, REG1, "red");

    let deleted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&deleted);
    let id = store
        .notifier()
        .subscribe(REG1, move |event| {
            if event.kind == ChangeKind::Deleted {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

    store.delete(&red.uri).unwrap();
    assert!(eventually(|| deleted.load(Ordering::SeqCst) == 1));

    assert!(store.notifier().unsubscribe(id));
    let blue = add_concept(&store, REG1, "blue");
    store.delete(&blue.uri).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(deleted.load(Ordering::SeqCst), 1);
    assert!(store.metrics().notifications_published >= 4);
}

// =============================================================================
// Invalidating cache
// =============================================================================

/// Cached entries are dropped when the resource or a descendant changes.
#[test]
fn test_cache_invalidated_by_commits() {
    let store = notifying_store();
    add_reg1(&store);

    let cache: InvalidatingCache<usize> = InvalidatingCache::attach(store.notifier(), REG1).unwrap();
    let count = cache
        .get_or_insert_with(REG1, || {
            let members = store
                .list_members(REG1, regstore::StatusFilter::Any, None)?
                .collect::<regstore::RegistryResult<Vec<_>>>()?;
            Ok(members.len())
        })
        .unwrap();
    assert_eq!(count, 0);
    cache.insert("http://example.com/reg10", 7);
    assert_eq!(cache.len(), 2);

    add_concept(&store, REG1, "red");
    assert!(eventually(|| cache.get(REG1).is_none()));
    assert_eq!(cache.get("http://example.com/reg10"), Some(7));

    assert!(cache.detach(store.notifier()));
}

/// A value loaded while an invalidation lands is returned but not kept.
#[test]
fn test_cache_discards_value_invalidated_during_load() {
    let store = notifying_store();
    add_reg1(&store);
    let red = add_concept(&store, REG1, "red");

    let cache: InvalidatingCache<String> = InvalidatingCache::attach(store.notifier(), REG1).unwrap();
    // registered after the cache, so it runs after the cache's callback
    let updated = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&updated);
    let red_uri = red.uri.clone();
    store
        .notifier()
        .subscribe(REG1, move |event| {
            if event.kind == ChangeKind::Updated && event.uri == red_uri {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

    let loaded = cache
        .get_or_insert_with(&red.uri, || {
            let label = store.get_item(&red.uri, false)?.label().unwrap_or_default().to_string();
            let guard = store.lock(&red.uri)?;
            store.update(&guard, &red.uri, regstore::EntityGraph::new("").labelled("red2"), false)?;
            drop(guard);
            assert!(eventually(|| updated.load(Ordering::SeqCst) == 1));
            Ok(label)
        })
        .unwrap();

    assert_eq!(loaded, "red");
    assert_eq!(cache.get(&red.uri), None);

    let fresh = cache
        .get_or_insert_with(&red.uri, || {
            Ok(store.get_item(&red.uri, false)?.label().unwrap_or_default().to_string())
        })
        .unwrap();
    assert_eq!(fresh, "red2");
    assert_eq!(cache.get(&red.uri), Some("red2".to_string()));
}
