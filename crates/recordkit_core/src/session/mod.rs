//! Unit-of-work session over the record store.
//!
//! # Responsibility
//! - Maintain the identity map of materialized records and the pending
//!   insert/dirty/delete sets until commit.
//! - Provide the find-or-create reconciliation and single-object cache
//!   helpers generic callers use.
//!
//! # Invariants
//! - At most one in-session record instance exists per identity; fetches
//!   never replace an already-loaded record.
//! - A record id is only meaningful within its originating session.
//! - Child commits hand their changes upward as owned values; only root
//!   commits touch the store.

use crate::events::{SessionEvent, SessionEventSender, SessionId};
use crate::model::entity::{Entity, RemoteInfo};
use crate::model::record::{Record, RecordId};
use crate::query::{FetchRequest, Filter};
use crate::store::{ChangeSet, RecordStore, StoreResult};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;
use uuid::Uuid;

/// A unit-of-work scope for reading and mutating persisted records.
pub struct Session {
    id: SessionId,
    parent: Option<SessionId>,
    store: Rc<dyn RecordStore>,
    events: SessionEventSender,
    /// Identity map: every materialized record, keyed by identity.
    loaded: BTreeMap<RecordId, Record>,
    inserted: BTreeSet<RecordId>,
    dirty: BTreeSet<RecordId>,
    pending_deletes: BTreeSet<RecordId>,
    /// Per-session single-object cache. Negative lookups are cached too.
    single_cache: HashMap<String, Option<RecordId>>,
}

impl Session {
    /// Creates a long-lived root session whose commits write to the store.
    pub fn root(store: Rc<dyn RecordStore>, events: SessionEventSender) -> Session {
        Session {
            id: Uuid::new_v4(),
            parent: None,
            store,
            events,
            loaded: BTreeMap::new(),
            inserted: BTreeSet::new(),
            dirty: BTreeSet::new(),
            pending_deletes: BTreeSet::new(),
            single_cache: HashMap::new(),
        }
    }

    /// Spawns a short-lived child session sharing this session's store and
    /// event port. Child commits propagate through the event queue instead
    /// of writing to the store.
    pub fn spawn_child(&self) -> Session {
        Session {
            id: Uuid::new_v4(),
            parent: Some(self.id),
            store: Rc::clone(&self.store),
            events: self.events.clone(),
            loaded: BTreeMap::new(),
            inserted: BTreeSet::new(),
            dirty: BTreeSet::new(),
            pending_deletes: BTreeSet::new(),
            single_cache: HashMap::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn parent(&self) -> Option<SessionId> {
        self.parent
    }

    /// Whether any insert, mutation or delete is awaiting commit.
    pub fn has_changes(&self) -> bool {
        !self.inserted.is_empty() || !self.dirty.is_empty() || !self.pending_deletes.is_empty()
    }

    /// Read access to a materialized record.
    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.loaded.get(&id)
    }

    /// Write access to a materialized record; marks it dirty.
    pub fn record_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        let record = self.loaded.get_mut(&id)?;
        if !self.inserted.contains(&id) {
            self.dirty.insert(id);
        }
        Some(record)
    }

    /// Inserts a fresh, empty record of the entity type.
    pub fn insert_record<E: Entity>(&mut self) -> RecordId {
        let record = Record::new(E::entity_name());
        let id = record.id;
        self.loaded.insert(id, record);
        self.inserted.insert(id);
        id
    }

    /// Marks a record for deletion on the next commit.
    pub fn delete_record(&mut self, id: RecordId) {
        self.loaded.remove(&id);
        self.inserted.remove(&id);
        self.dirty.remove(&id);
        self.pending_deletes.insert(id);
    }

    /// Scans only already-materialized records for the first filter match.
    ///
    /// No I/O; cost is linear in the number of resident records.
    pub fn materialized_match<E: Entity>(&self, filter: &Filter) -> Option<RecordId> {
        self.loaded
            .values()
            .find(|record| {
                record.entity == E::entity_name()
                    && !self.pending_deletes.contains(&record.id)
                    && filter.matches(record)
            })
            .map(|record| record.id)
    }

    /// Runs a fetch against the store and registers results in the
    /// identity map. A record that is already resident keeps its in-session
    /// state; the stale store copy is discarded.
    ///
    /// Pending-deleted records are dropped from the results. The store
    /// limit is widened by the pending-delete count so a bounded fetch
    /// still sees matches ranked behind a record this session is deleting.
    pub fn fetch<E: Entity>(&mut self, request: &FetchRequest) -> StoreResult<Vec<RecordId>> {
        let fetched = if let (Some(limit), false) =
            (request.limit, self.pending_deletes.is_empty())
        {
            let mut widened = request.clone();
            widened.limit = Some(limit + self.pending_deletes.len());
            self.store.fetch(E::entity_name(), &widened)?
        } else {
            self.store.fetch(E::entity_name(), request)?
        };

        let mut ids = Vec::with_capacity(fetched.len());
        for record in fetched {
            let id = record.id;
            if self.pending_deletes.contains(&id) {
                continue;
            }
            self.loaded.entry(id).or_insert(record);
            ids.push(id);
        }
        if let Some(limit) = request.limit {
            ids.truncate(limit);
        }
        Ok(ids)
    }

    /// Fetch variant returning cloned snapshots, for render-side consumers
    /// that must not hold borrows into the session.
    pub fn fetch_records<E: Entity>(&mut self, request: &FetchRequest) -> StoreResult<Vec<Record>> {
        let ids = self.fetch::<E>(request)?;
        Ok(ids
            .into_iter()
            .filter_map(|id| self.loaded.get(&id).cloned())
            .collect())
    }

    /// Counts persisted records matching the filter. Pending in-session
    /// changes are not included.
    pub fn count<E: Entity>(&self, filter: &Filter) -> StoreResult<usize> {
        self.store.count(E::entity_name(), filter)
    }

    /// Returns a matching record, checking resident records before issuing
    /// a limit-1 store fetch with the type's default sort.
    pub fn find_or_fetch<E: Entity>(&mut self, filter: &Filter) -> StoreResult<Option<RecordId>> {
        if let Some(id) = self.materialized_match::<E>(filter) {
            return Ok(Some(id));
        }
        let request = FetchRequest::new(filter.clone())
            .sorted_by(E::default_sort())
            .limited_to(1);
        Ok(self.fetch::<E>(&request)?.into_iter().next())
    }

    /// Locates a record matching the filter or creates one, then applies
    /// `configure` in place.
    ///
    /// Running `configure` on the hit path as well makes repeated calls
    /// with the same identity behave as idempotent upserts.
    pub fn find_or_create<E: Entity>(
        &mut self,
        filter: &Filter,
        configure: impl FnOnce(&mut Record),
    ) -> StoreResult<RecordId> {
        let id = match self.find_or_fetch::<E>(filter)? {
            Some(id) => id,
            None => self.insert_record::<E>(),
        };
        if let Some(record) = self.record_mut(id) {
            configure(record);
        }
        Ok(id)
    }

    /// Remote-identity variant of [`Session::find_or_create`].
    ///
    /// Stamps `remote_id`, `created_at` and `updated_at` from the payload
    /// before running the caller's `configure`. Guarantees at most one
    /// record per (entity, remote identity): resolution happens before
    /// creation, and creation only occurs on a genuine miss.
    ///
    /// # Panics
    /// Panics when the payload carries no remote identity; that is a caller
    /// contract violation, not a runtime condition.
    pub fn find_or_create_remote<E: Entity>(
        &mut self,
        remote: &impl RemoteInfo,
        configure: impl FnOnce(&mut Record),
    ) -> StoreResult<RecordId> {
        let remote_id = remote.remote_id().unwrap_or_else(|| {
            panic!(
                "remote payload for `{}` is missing its remote identity",
                E::entity_name()
            )
        });
        let filter = Filter::remote_identity(remote_id);
        let created_at = remote.created_at();
        let updated_at = remote.updated_at();
        self.find_or_create::<E>(&filter, |record| {
            record.remote_id = Some(remote_id.to_string());
            record.created_at = created_at;
            record.updated_at = updated_at;
            configure(record);
        })
    }

    /// Returns the cached single-object entry for a key, if one was stored.
    pub fn cached_single(&self, key: &str) -> Option<Option<RecordId>> {
        self.single_cache.get(key).copied()
    }

    /// Stores a single-object cache entry. `None` caches a negative result.
    pub fn cache_single(&mut self, key: &str, value: Option<RecordId>) {
        self.single_cache.insert(key.to_string(), value);
    }

    /// Memoized lookup of "the one record" matching a supposedly singleton
    /// query. A cache hit returns without touching the store.
    ///
    /// The miss path fetches with limit 2 so that a query silently matching
    /// multiple records is caught instead of masked.
    ///
    /// # Panics
    /// Panics when the query matches more than one record.
    pub fn fetch_single_cached<E: Entity>(
        &mut self,
        key: &str,
        filter: &Filter,
    ) -> StoreResult<Option<RecordId>> {
        if let Some(cached) = self.cached_single(key) {
            return Ok(cached);
        }

        let request = FetchRequest::new(filter.clone())
            .sorted_by(E::default_sort())
            .limited_to(2);
        let ids = self.fetch::<E>(&request)?;
        let result = match ids.len() {
            0 => None,
            1 => Some(ids[0]),
            _ => panic!(
                "single-object query `{key}` on `{}` matched multiple records, expected at most 1",
                E::entity_name()
            ),
        };
        self.cache_single(key, result);
        Ok(result)
    }

    /// Commits pending changes.
    ///
    /// Root sessions apply their change set to the store; child sessions
    /// publish it for the container to absorb into the parent. Either way a
    /// saved event is emitted after the commit completes. A session without
    /// changes commits as a no-op and emits nothing.
    ///
    /// On a failed store apply the pending sets are left intact, so the
    /// commit can be retried once the failure clears.
    pub fn commit(&mut self) -> StoreResult<()> {
        if !self.has_changes() {
            return Ok(());
        }

        let changes = self.collect_changes();
        if self.parent.is_none() {
            self.store.apply(&changes)?;
            self.clear_pending();
            self.events.publish(SessionEvent::Saved {
                session: self.id,
                parent: self.parent,
                changes: ChangeSet::default(),
            });
        } else {
            self.clear_pending();
            self.events.publish(SessionEvent::Saved {
                session: self.id,
                parent: self.parent,
                changes,
            });
        }
        Ok(())
    }

    /// Absorbs a child session's committed change set.
    ///
    /// Incoming records enter the identity map as dirty so the next commit
    /// persists them; an already-resident record is replaced, since the
    /// child's committed state supersedes it.
    pub fn absorb(&mut self, changes: ChangeSet) {
        for record in changes.upserts {
            let id = record.id;
            self.loaded.insert(id, record);
            if !self.inserted.contains(&id) {
                self.dirty.insert(id);
            }
        }
        for id in changes.deletes {
            self.delete_record(id);
        }
    }

    /// Drops all session state: identity map, pending changes and the
    /// single-object cache. Used after bulk deletes bypass the session.
    pub fn reset(&mut self) {
        self.loaded.clear();
        self.inserted.clear();
        self.dirty.clear();
        self.pending_deletes.clear();
        self.single_cache.clear();
    }

    fn collect_changes(&self) -> ChangeSet {
        let mut upserts = Vec::new();
        for id in self.inserted.iter().chain(self.dirty.iter()) {
            if let Some(record) = self.loaded.get(id) {
                upserts.push(record.clone());
            }
        }
        ChangeSet {
            upserts,
            deletes: self.pending_deletes.iter().copied().collect(),
        }
    }

    fn clear_pending(&mut self) {
        self.inserted.clear();
        self.dirty.clear();
        self.pending_deletes.clear();
    }
}
