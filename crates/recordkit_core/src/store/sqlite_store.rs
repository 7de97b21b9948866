//! SQLite-backed record store.
//!
//! # Responsibility
//! - Persist generic records in the `records` table with JSON field maps.
//! - Evaluate filters, sorting and limits over decoded rows.
//!
//! # Invariants
//! - `try_new` rejects connections whose schema was not migrated.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::latest_version;
use crate::model::record::{Record, RecordId};
use crate::query::{sort_records, FetchRequest, Filter};
use crate::store::{ChangeSet, RecordStore, StoreError, StoreResult};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const RECORD_SELECT_SQL: &str = "SELECT
    id,
    entity,
    remote_id,
    created_at,
    updated_at,
    fields
FROM records
WHERE entity = ?1";

const REQUIRED_COLUMNS: &[&str] = &[
    "id",
    "entity",
    "remote_id",
    "created_at",
    "updated_at",
    "fields",
];

/// SQLite-backed implementation of [`RecordStore`].
///
/// Owns its connection; sessions share the store behind an `Rc`.
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    /// Wraps a migrated connection, validating the schema first.
    ///
    /// # Errors
    /// - `UninitializedStore` when `PRAGMA user_version` does not match the
    ///   latest migration (typically a raw, unmigrated connection).
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when the schema
    ///   was tampered with or belongs to another application.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        let expected = latest_version();
        let actual: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual != expected {
            return Err(StoreError::UninitializedStore {
                expected_version: expected,
                actual_version: actual,
            });
        }

        let table_count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'records';",
            [],
            |row| row.get(0),
        )?;
        if table_count == 0 {
            return Err(StoreError::MissingRequiredTable("records"));
        }

        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('records');")?;
        let mut rows = stmt.query([])?;
        let mut present = Vec::new();
        while let Some(row) = rows.next()? {
            present.push(row.get::<_, String>(0)?);
        }
        for column in REQUIRED_COLUMNS {
            if !present.iter().any(|name| name == column) {
                return Err(StoreError::MissingRequiredColumn {
                    table: "records",
                    column,
                });
            }
        }
        drop(rows);
        drop(stmt);

        Ok(Self { conn })
    }

    fn scan(&self, entity: &str, filter: Option<&Filter>) -> StoreResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(RECORD_SELECT_SQL)?;
        let mut rows = stmt.query([entity])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            let record = parse_record_row(row)?;
            if filter.map_or(true, |filter| filter.matches(&record)) {
                records.push(record);
            }
        }

        Ok(records)
    }
}

impl RecordStore for SqliteRecordStore {
    fn fetch(&self, entity: &str, request: &FetchRequest) -> StoreResult<Vec<Record>> {
        let mut records = self.scan(entity, request.filter.as_ref())?;
        sort_records(&mut records, &request.sort);
        if let Some(limit) = request.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    fn count(&self, entity: &str, filter: &Filter) -> StoreResult<usize> {
        Ok(self.scan(entity, Some(filter))?.len())
    }

    fn delete_matching(&self, entity: &str, filter: &Filter) -> StoreResult<Vec<RecordId>> {
        let doomed: Vec<RecordId> = self
            .scan(entity, Some(filter))?
            .into_iter()
            .map(|record| record.id)
            .collect();

        let tx = self.conn.unchecked_transaction()?;
        for id in &doomed {
            tx.execute("DELETE FROM records WHERE id = ?1;", [id.to_string()])?;
        }
        tx.commit()?;

        Ok(doomed)
    }

    fn apply(&self, changes: &ChangeSet) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;

        for record in &changes.upserts {
            let fields = serde_json::to_string(&record.fields).map_err(|err| {
                StoreError::InvalidData(format!(
                    "could not encode fields for record `{}`: {err}",
                    record.id
                ))
            })?;
            tx.execute(
                "INSERT INTO records (id, entity, remote_id, created_at, updated_at, fields)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (id) DO UPDATE SET
                    entity = excluded.entity,
                    remote_id = excluded.remote_id,
                    created_at = excluded.created_at,
                    updated_at = excluded.updated_at,
                    fields = excluded.fields;",
                params![
                    record.id.to_string(),
                    record.entity.as_str(),
                    record.remote_id.as_deref(),
                    record.created_at,
                    record.updated_at,
                    fields,
                ],
            )?;
        }

        for id in &changes.deletes {
            tx.execute("DELETE FROM records WHERE id = ?1;", [id.to_string()])?;
        }

        tx.commit()?;
        Ok(())
    }
}

fn parse_record_row(row: &Row<'_>) -> StoreResult<Record> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid uuid value `{id_text}` in records.id"))
    })?;

    let fields_text: String = row.get("fields")?;
    let fields = serde_json::from_str(&fields_text).map_err(|err| {
        StoreError::InvalidData(format!("invalid field map for record `{id_text}`: {err}"))
    })?;

    Ok(Record {
        id,
        entity: row.get("entity")?,
        fields,
        remote_id: row.get("remote_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
