//! Convenience layer over a SQLite-backed record store.
//! Generic find-or-create reconciliation, per-session caching, and
//! notification-driven save propagation live here.

pub mod container;
pub mod datasource;
pub mod db;
pub mod events;
pub mod logging;
pub mod model;
pub mod query;
pub mod session;
pub mod store;

pub use container::{DeleteRequest, PersistentContainer, StoreConfig};
pub use datasource::{FetchedResults, ResultsDataSource, SectionedResultsDataSource};
pub use events::{session_events, SessionEvent, SessionEventSender, SessionId};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entity::{Entity, RemoteInfo};
pub use model::record::{FieldValue, Record, RecordId, REMOTE_ID_FIELD};
pub use query::{sorted_request, sorted_request_with, FetchRequest, Filter, SortKey};
pub use session::Session;
pub use store::{ChangeSet, RecordStore, SqliteRecordStore, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
