//! Register membership queries and tags
//!
//! A listing at time `t` joins two independent histories: the register's
//! own chain says which notations were members at `t`, and each member's
//! chain says what its status was at `t`. A member appears only if both
//! agree.

use std::vec;

use chrono::{DateTime, Utc};

use super::engine::Store;
use super::state::{ChangeSet, State};
use crate::errors::{RegistryError, RegistryResult};
use crate::observability::{log_event_with_fields, Event};
use crate::registry::rules::check_notation;
use crate::registry::{sort_notations, MemberSummary, RegisterItem, StatusFilter, Tag};
use crate::version::version_uri;

/// Lazy member listing.
///
/// The member set is fixed when the iterator is created; each member's
/// item is looked up as the iterator advances. A store failure while
/// advancing is yielded once as an error and ends the listing.
#[derive(Debug)]
pub struct MemberIter<'a> {
    store: &'a Store,
    entries: vec::IntoIter<(String, String)>,
    filter: StatusFilter,
    at: Option<DateTime<Utc>>,
}

fn summarize(
    state: &State,
    filter: StatusFilter,
    at: Option<DateTime<Utc>>,
    notation: &str,
    item_uri: &str,
) -> Option<MemberSummary> {
    // absent at `at` per the member's own history
    let record = state.item_at(item_uri, at).ok()?;
    let item = &record.item;
    if !filter.matches(item.status) {
        return None;
    }
    Some(MemberSummary {
        item_uri: item.uri.clone(),
        entity_uri: item.entity_uri.clone(),
        notation: notation.to_string(),
        status: item.status,
        label: item.label().map(str::to_string),
        types: item.item_class.clone(),
        version: item.version,
    })
}

impl Iterator for MemberIter<'_> {
    type Item = RegistryResult<MemberSummary>;

    fn next(&mut self) -> Option<RegistryResult<MemberSummary>> {
        if self.entries.as_slice().is_empty() {
            return None;
        }
        let store = self.store;
        let state = match store.read_state() {
            Ok(state) => state,
            Err(e) => {
                // report once, then end
                self.entries = Vec::new().into_iter();
                return Some(Err(e));
            }
        };
        for (notation, item_uri) in self.entries.by_ref() {
            if let Some(summary) = summarize(&state, self.filter, self.at, &notation, &item_uri) {
                return Some(Ok(summary));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.entries.len()))
    }
}

impl Store {
    /// Members of `register` passing `filter`, as of `at` or now.
    ///
    /// Ordered by notation, numerically when every notation is a number.
    /// Listing at an instant before the register existed yields nothing.
    pub fn list_members(
        &self,
        register: &str,
        filter: StatusFilter,
        at: Option<DateTime<Utc>>,
    ) -> RegistryResult<MemberIter<'_>> {
        let mut entries = {
            let state = self.read_state()?;
            let register_uri = state.resolve_register_uri(register)?;
            match state.register_at(&register_uri, at) {
                Ok(snapshot) => snapshot
                    .members
                    .iter()
                    .map(|(n, u)| (n.clone(), u.clone()))
                    .collect(),
                Err(_) if at.is_some() => Vec::new(),
                Err(e) => return Err(e),
            }
        };
        sort_notations(&mut entries);
        Ok(MemberIter {
            store: self,
            entries: entries.into_iter(),
            filter,
            at,
        })
    }

    /// Full current items for every member of `register`, resolved under
    /// one read of the store
    pub fn fetch_members(&self, register: &str, with_entity: bool) -> RegistryResult<Vec<RegisterItem>> {
        self.fetch(register, None, with_entity)
    }

    /// Full items for the members of `register` as they were at `at`
    pub fn fetch_members_at(
        &self,
        register: &str,
        at: DateTime<Utc>,
        with_entity: bool,
    ) -> RegistryResult<Vec<RegisterItem>> {
        self.fetch(register, Some(at), with_entity)
    }

    fn fetch(
        &self,
        register: &str,
        at: Option<DateTime<Utc>>,
        with_entity: bool,
    ) -> RegistryResult<Vec<RegisterItem>> {
        let state = self.read_state()?;
        let register_uri = state.resolve_register_uri(register)?;
        let snapshot = match state.register_at(&register_uri, at) {
            Ok(s) => s,
            Err(_) if at.is_some() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut entries: Vec<(String, String)> = snapshot
            .members
            .iter()
            .map(|(n, u)| (n.clone(), u.clone()))
            .collect();
        sort_notations(&mut entries);
        Ok(entries
            .iter()
            .filter_map(|(_, item_uri)| state.item_at(item_uri, at).ok())
            .map(|record| state.materialize(&record, with_entity, at))
            .collect())
    }

    /// True if `notation` names a current, non-Invalid member of `register`
    pub fn contains(&self, register: &str, notation: &str) -> RegistryResult<bool> {
        let state = self.read_state()?;
        let register_uri = state.resolve_register_uri(register)?;
        let snapshot = state.current_register(&register_uri)?;
        Ok(snapshot
            .members
            .get(notation)
            .and_then(|item_uri| state.current_item(item_uri).ok())
            .map_or(false, |r| r.item.is_live()))
    }

    /// Capture the current non-Invalid members of `register` under `name`
    pub fn tag(&self, register: &str, name: &str) -> RegistryResult<Tag> {
        let register_uri = self.read_state()?.resolve_register_uri(register)?;
        let _guard = self
            .locks
            .acquire(&register_uri)
            .map_err(|e| self.rejected("tag", &register_uri, e))?;
        self.tag_locked(&register_uri, name)
            .map_err(|e| self.rejected("tag", &register_uri, e))
    }

    fn tag_locked(&self, register_uri: &str, name: &str) -> RegistryResult<Tag> {
        check_notation(name).map_err(|v| RegistryError::Validation(vec![v]))?;
        let at = self.clock.now();
        let tag = {
            let state = self.read_state()?;
            if state
                .tags
                .get(register_uri)
                .map_or(false, |t| t.contains_key(name))
            {
                return Err(RegistryError::conflict(format!(
                    "tag '{}' already exists on <{}>",
                    name, register_uri
                )));
            }
            let snapshot = state.current_register(register_uri)?;
            let mut entries: Vec<(String, String)> = snapshot
                .members
                .iter()
                .map(|(n, u)| (n.clone(), u.clone()))
                .collect();
            sort_notations(&mut entries);
            let members = entries
                .iter()
                .filter_map(|(_, item_uri)| state.current_item(item_uri).ok())
                .filter(|r| r.item.is_live())
                .map(|r| version_uri(r.uri(), r.version()))
                .collect();
            Tag {
                name: name.to_string(),
                register: register_uri.to_string(),
                register_version: snapshot.version,
                created: at,
                members,
            }
        };

        let mut changes = ChangeSet::new();
        changes.tag(tag.clone());
        self.commit(changes, at)?;
        log_event_with_fields(
            Event::RegisterTagged,
            &[
                ("register", register_uri),
                ("tag", name),
                ("members", &tag.members.len().to_string()),
            ],
        );
        Ok(tag)
    }

    pub fn get_tag(&self, register: &str, name: &str) -> RegistryResult<Tag> {
        let state = self.read_state()?;
        let register_uri = state.resolve_register_uri(register)?;
        state
            .tags
            .get(&register_uri)
            .and_then(|t| t.get(name))
            .cloned()
            .ok_or_else(|| RegistryError::not_found(format!("tag '{}' on <{}>", name, register_uri)))
    }

    /// Tags of `register`, ordered by name
    pub fn list_tags(&self, register: &str) -> RegistryResult<Vec<Tag>> {
        let state = self.read_state()?;
        let register_uri = state.resolve_register_uri(register)?;
        Ok(state
            .tags
            .get(&register_uri)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use super::*;
    use crate::errors::ErrorKind;
    use crate::graph::{vocab, EntityGraph};
    use crate::registry::ItemRequest;
    use crate::store::StoreConfig;

    #[test]
    fn test_poisoned_state_surfaces_as_error() {
        let store = Store::open(StoreConfig::new("http://example.com/").with_notifier(false)).unwrap();
        store.create_root(EntityGraph::new("").labelled("root")).unwrap();
        let entity = EntityGraph::new("").labelled("reg1").typed(vocab::REG_REGISTER);
        store
            .add_to_register("http://example.com/", ItemRequest::new(entity).with_notation("reg1"))
            .unwrap();

        let mut members = store
            .list_members("http://example.com/", StatusFilter::Any, None)
            .unwrap();
        let _ = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.state.write().unwrap();
            panic!("poison the store state");
        }));

        let err = members.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(members.next().is_none());
    }
}
