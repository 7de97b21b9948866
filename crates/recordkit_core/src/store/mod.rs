//! Record store boundary consumed by sessions and the container.
//!
//! # Responsibility
//! - Define the storage-engine contract: fetch, count, bulk delete, and
//!   change-set application.
//! - Keep storage failures as typed results so callers decide severity.
//!
//! # Invariants
//! - Store implementations never panic on runtime failures.
//! - `apply` is atomic: either the whole change set lands or none of it.

use crate::db::DbError;
use crate::model::record::{Record, RecordId};
use crate::query::{FetchRequest, Filter};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite_store;

pub use sqlite_store::SqliteRecordStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-engine error for record fetch, mutation and setup operations.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    InvalidData(String),
    UninitializedStore {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::UninitializedStore {
                expected_version,
                actual_version,
            } => write!(
                f,
                "store schema version {actual_version} does not match expected {expected_version}; run migrations first"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "store is missing required table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "store table `{table}` is missing required column `{column}`")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Pending mutations produced by one session commit.
///
/// Change sets are owned values; they are the only record data that crosses
/// a session boundary.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub upserts: Vec<Record>,
    pub deletes: Vec<RecordId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// Storage engine contract.
///
/// Sessions issue bounded fetches and counts through this trait and commit
/// their pending work as a [`ChangeSet`]; the container issues bulk deletes.
pub trait RecordStore {
    /// Runs a bounded, ordered query and returns fully materialized records.
    fn fetch(&self, entity: &str, request: &FetchRequest) -> StoreResult<Vec<Record>>;

    /// Counts persisted records of the entity type matching the filter.
    fn count(&self, entity: &str, filter: &Filter) -> StoreResult<usize>;

    /// Deletes every matching record, returning the deleted identities.
    fn delete_matching(&self, entity: &str, filter: &Filter) -> StoreResult<Vec<RecordId>>;

    /// Applies a session's committed change set atomically.
    fn apply(&self, changes: &ChangeSet) -> StoreResult<()>;
}
