//! Lifecycle-managed persistence container.
//!
//! # Responsibility
//! - Own the storage stack: open the backing (durable or in-memory), build
//!   the store, and host the long-lived main session.
//! - Propagate background-session commits into the main session via the
//!   event queue.
//! - Execute filter-scoped bulk deletes and drop stale main-session state
//!   afterwards.
//!
//! # Invariants
//! - A child's changes are absorbed and the main session committed strictly
//!   after the child commit completes.
//! - Save-propagation failures are logged, never surfaced to the caller.

use crate::db::{open_db, open_db_in_memory};
use crate::events::{session_events, SessionEvent, SessionEventReceiver};
use crate::model::record::RecordId;
use crate::query::Filter;
use crate::session::Session;
use crate::store::{RecordStore, SqliteRecordStore, StoreResult};
use log::{error, info};
use std::path::PathBuf;
use std::rc::Rc;

/// Backing-store selection for [`PersistentContainer::open`].
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// Durable file-backed store.
    OnDisk(PathBuf),
    /// Private in-memory store, discarded on drop. Used by tests and
    /// ephemeral sessions.
    InMemory,
}

/// One filter-scoped bulk delete.
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub entity: &'static str,
    pub filter: Filter,
}

/// Owns the record store, the main session and the commit-event queue.
pub struct PersistentContainer {
    store: Rc<dyn RecordStore>,
    main: Session,
    events: SessionEventReceiver,
}

impl PersistentContainer {
    /// Prepares the storage backing and the main session.
    ///
    /// Open failures surface as errors; whether a failed open is fatal is
    /// the caller's decision.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let conn = match &config {
            StoreConfig::OnDisk(path) => open_db(path)?,
            StoreConfig::InMemory => open_db_in_memory()?,
        };
        let store: Rc<dyn RecordStore> = Rc::new(SqliteRecordStore::try_new(conn)?);
        let (sender, receiver) = session_events();
        let main = Session::root(Rc::clone(&store), sender);
        Ok(Self {
            store,
            main,
            events: receiver,
        })
    }

    /// The long-lived, UI-facing session.
    pub fn main_session(&mut self) -> &mut Session {
        &mut self.main
    }

    /// Spawns a short-lived child session for batch work.
    ///
    /// The caller runs its work, commits the child, and then calls
    /// [`PersistentContainer::process_pending_saves`] (or uses
    /// [`PersistentContainer::perform_background_task`], which does both).
    pub fn background_session(&self) -> Session {
        self.main.spawn_child()
    }

    /// Runs `work` on a fresh background session, then drains the commit
    /// queue so any committed changes reach the main session.
    pub fn perform_background_task<T>(
        &mut self,
        work: impl FnOnce(&mut Session) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut session = self.background_session();
        let outcome = work(&mut session)?;
        drop(session);
        self.process_pending_saves();
        Ok(outcome)
    }

    /// Drains queued session-saved events.
    ///
    /// For each committing child whose parent is the main session, the
    /// committed change set is absorbed; if the main session then has
    /// pending changes it is committed, logging (not returning) failures.
    /// Root-session events are informational and skipped.
    ///
    /// A failed main commit leaves the absorbed changes pending in the
    /// main session; a later drain or explicit commit retries them.
    pub fn process_pending_saves(&mut self) {
        for event in self.events.drain() {
            let SessionEvent::Saved {
                session,
                parent,
                changes,
            } = event;
            if parent != Some(self.main.id()) {
                continue;
            }
            let upserts = changes.upserts.len();
            let deletes = changes.deletes.len();
            self.main.absorb(changes);

            let outcome = if self.main.has_changes() {
                self.main.commit()
            } else {
                Ok(())
            };
            match outcome {
                Ok(()) => info!(
                    "event=session_saved module=container status=ok session={session} upserts={upserts} deletes={deletes}"
                ),
                Err(err) => error!(
                    "event=session_saved module=container status=error session={session} upserts={upserts} deletes={deletes} error={err}"
                ),
            }
        }
        // Root commits emitted just above also queue events; discard them.
        let _ = self.events.drain();
    }

    /// Executes each filter-scoped bulk delete directly against the store,
    /// collecting the deleted identities, then resets the main session so
    /// stale materialized copies are dropped.
    pub fn batch_delete(&mut self, requests: &[DeleteRequest]) -> StoreResult<Vec<RecordId>> {
        let mut deleted = Vec::new();
        for request in requests {
            let ids = self.store.delete_matching(request.entity, &request.filter)?;
            info!(
                "event=batch_delete module=container status=ok entity={} deleted={}",
                request.entity,
                ids.len()
            );
            deleted.extend(ids);
        }
        self.main.reset();
        Ok(deleted)
    }
}
