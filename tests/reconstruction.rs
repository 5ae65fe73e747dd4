//! Point-in-Time Reconstruction Tests
//!
//! Listings at an instant join the register's membership history with each
//! member's own status history. These tests replay a small registry and
//! read it back at several instants.

mod common;

use chrono::{DateTime, Duration, Utc};
use common::*;
use regstore::store::ReadView;
use regstore::version::VersionSelector;
use regstore::{EntityGraph, ErrorKind, Status, StatusFilter, Store};

fn notations(store: &Store, register: &str, filter: StatusFilter, at: Option<DateTime<Utc>>) -> Vec<String> {
    store
        .list_members(register, filter, at)
        .unwrap()
        .map(|m| m.unwrap().notation)
        .collect()
}

/// reg1 with `red` added at t(0), made Stable at t(1), relabelled at t(2)
fn red_scenario() -> (Store, String) {
    let (store, clock) = store();
    add_reg1(&store);

    clock.set(t(0));
    let red = add_concept(&store, REG1, "red");
    clock.set(t(1));
    store.set_status(&red.uri, Status::Stable).unwrap();
    clock.set(t(2));
    {
        let guard = store.lock(&red.uri).unwrap();
        store
            .update(&guard, &red.uri, EntityGraph::new("").labelled("red2"), false)
            .unwrap();
    }
    (store, red.uri)
}

// =============================================================================
// Temporal listings
// =============================================================================

/// Status filters apply to the member's status at the requested instant.
#[test]
fn test_listing_joins_status_history() {
    let (store, _red) = red_scenario();
    let half = Duration::milliseconds(500);

    assert_eq!(
        notations(&store, REG1, StatusFilter::Only(Status::Stable), Some(t(1) + half)),
        vec!["red"]
    );
    assert!(notations(&store, REG1, StatusFilter::Only(Status::Stable), Some(t(0) + half)).is_empty());
    assert_eq!(
        notations(&store, REG1, StatusFilter::Only(Status::Submitted), Some(t(0) + half)),
        vec!["red"]
    );
    assert_eq!(notations(&store, REG1, StatusFilter::Accepted, None), vec!["red"]);
}

/// Summaries carry the label the member had at that instant.
#[test]
fn test_listing_shows_historical_label() {
    let (store, _red) = red_scenario();

    let then: Vec<_> = store
        .list_members(REG1, StatusFilter::Any, Some(t(1) + Duration::milliseconds(500)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(then[0].label.as_deref(), Some("red"));
    assert_eq!(then[0].version, 2);

    let now: Vec<_> = store
        .list_members(REG1, StatusFilter::Any, None)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(now[0].label.as_deref(), Some("red2"));
    assert_eq!(now[0].version, 3);
}

/// Members registered after the instant are absent.
#[test]
fn test_listing_before_membership() {
    let (store, _red) = red_scenario();
    assert!(notations(&store, REG1, StatusFilter::Any, Some(t(-1))).is_empty());
    // before reg1 itself existed
    assert!(notations(&store, REG1, StatusFilter::Any, Some(t(-500))).is_empty());

    let err = store
        .list_members("http://example.com/nowhere", StatusFilter::Any, None)
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

/// Listing at a future instant equals the current listing.
#[test]
fn test_listing_at_now_matches_current() {
    let (store, _red) = red_scenario();
    let current: Vec<_> = store
        .list_members(REG1, StatusFilter::Any, None)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let later: Vec<_> = store
        .list_members(REG1, StatusFilter::Any, Some(t(10_000)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(current, later);
}

// =============================================================================
// Historical items
// =============================================================================

/// Version 2 of red is Stable with its original label and entity.
#[test]
fn test_historical_version() {
    let (store, red) = red_scenario();
    let v2 = store.get_version(&red, VersionSelector::Number(2)).unwrap();
    assert_eq!(v2.status, Status::Stable);
    assert_eq!(v2.label(), Some("red"));
    assert_eq!(v2.entity.unwrap().label(), Some("red"));

    let at = store
        .get_version(&red, VersionSelector::At(t(2) + Duration::seconds(1)))
        .unwrap();
    assert_eq!(at.version, 3);
    assert_eq!(at.label(), Some("red2"));
}

/// Full member items can be fetched as of an instant.
#[test]
fn test_fetch_members_at() {
    let (store, _red) = red_scenario();
    let then = store
        .fetch_members_at(REG1, t(0) + Duration::milliseconds(500), true)
        .unwrap();
    assert_eq!(then.len(), 1);
    assert_eq!(then[0].status, Status::Submitted);
    assert_eq!(then[0].entity.as_ref().unwrap().label(), Some("red"));

    let now = store.fetch_members(REG1, false).unwrap();
    assert_eq!(now[0].status, Status::Stable);
    assert!(now[0].entity.is_none());
}

/// Register snapshots keep their membership as of each version.
#[test]
fn test_register_entity_history() {
    let (store, clock) = store();
    add_reg1(&store);
    clock.set(t(0));
    add_concept(&store, REG1, "red");
    clock.set(t(10));
    add_concept(&store, REG1, "blue");

    let then = store.get_register_version(REG1, VersionSelector::At(t(5))).unwrap();
    assert_eq!(then.members.len(), 1);
    assert!(then.members.contains_key("red"));

    let current = store.read(REG1, ReadView::Entity).unwrap().entity.unwrap();
    assert_eq!(current.values(regstore::graph::vocab::REG_MEMBER).len(), 2);
}

// =============================================================================
// Ordering and root
// =============================================================================

/// All-numeric notations sort numerically; mixed sets sort lexically.
#[test]
fn test_member_ordering() {
    let (store, _clock) = store();
    add_reg1(&store);
    for n in ["10", "9", "100"] {
        add_concept(&store, REG1, n);
    }
    assert_eq!(notations(&store, REG1, StatusFilter::Any, None), vec!["9", "10", "100"]);

    add_concept(&store, REG1, "a");
    assert_eq!(
        notations(&store, REG1, StatusFilter::Any, None),
        vec!["10", "100", "9", "a"]
    );
}

/// The root register has an entity view but no item.
#[test]
fn test_root_register_reads() {
    let (store, _clock) = store();
    add_reg1(&store);

    let root = store.read(ROOT, ReadView::Entity).unwrap();
    assert!(root.metadata.is_none());
    assert_eq!(root.entity.unwrap().label(), Some("root"));

    assert_eq!(store.read(ROOT, ReadView::Metadata).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(store.get_item(ROOT, false).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(notations(&store, ROOT, StatusFilter::Any, None), vec!["reg1"]);

    let both = store.read(REG1, ReadView::WithMetadata).unwrap();
    assert!(both.metadata.is_some());
    assert!(both.entity.is_some());
}
