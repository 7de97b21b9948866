//! Persisted record and field value types.
//!
//! # Responsibility
//! - Hold one entity instance as a typed field map plus bookkeeping columns.
//! - Resolve reserved field names (`remote_id`, `created_at`, `updated_at`)
//!   uniformly for filtering and sorting.
//!
//! # Invariants
//! - `id` is stable and never reused for another record.
//! - `entity` never changes after creation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Stable identifier for every persisted record.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type RecordId = Uuid;

/// Reserved field name resolving to [`Record::remote_id`].
pub const REMOTE_ID_FIELD: &str = "remote_id";
/// Reserved field name resolving to [`Record::created_at`].
pub const CREATED_AT_FIELD: &str = "created_at";
/// Reserved field name resolving to [`Record::updated_at`].
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// One value inside a record's field map.
///
/// The untagged serde shape keeps persisted JSON natural: `null`, booleans,
/// numbers and strings round-trip without a discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    /// Total order used by sorted fetches: rank by variant, then by value.
    ///
    /// `Real` values that do not compare (NaN) are treated as equal, which
    /// keeps the sort stable instead of panicking on degenerate data.
    pub fn compare(&self, other: &FieldValue) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => Ordering::Equal,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a.cmp(b),
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a.cmp(b),
            (FieldValue::Real(a), FieldValue::Real(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (FieldValue::Integer(a), FieldValue::Real(b)) => {
                (*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (FieldValue::Real(a), FieldValue::Integer(b)) => {
                a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal)
            }
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Bool(_) => 1,
            FieldValue::Integer(_) | FieldValue::Real(_) => 2,
            FieldValue::Text(_) => 3,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(value) => write!(f, "{value}"),
            FieldValue::Integer(value) => write!(f, "{value}"),
            FieldValue::Real(value) => write!(f, "{value}"),
            FieldValue::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Real(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<RecordId> for FieldValue {
    fn from(value: RecordId) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// Canonical persisted record for any entity type.
///
/// Associations are modeled as a `Text` field holding the referenced
/// record's id, maintained by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable global ID used for identity-map membership and references.
    pub id: RecordId,
    /// Entity-type name this record belongs to.
    pub entity: String,
    /// Named attribute values.
    pub fields: BTreeMap<String, FieldValue>,
    /// External-system identifier, unique per entity type when present.
    pub remote_id: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: Option<i64>,
    /// Unix epoch milliseconds.
    pub updated_at: Option<i64>,
}

impl Record {
    /// Creates an empty record of the given entity type with a fresh ID.
    pub fn new(entity: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), entity)
    }

    /// Creates an empty record with a caller-provided stable ID.
    ///
    /// Used by store materialization, where identity already exists.
    pub fn with_id(id: RecordId, entity: impl Into<String>) -> Self {
        Self {
            id,
            entity: entity.into(),
            fields: BTreeMap::new(),
            remote_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Resolves a field name to its current value.
    ///
    /// Reserved names map onto the bookkeeping columns; anything else is
    /// looked up in the field map. Missing fields read as `Null`, so
    /// equality filters treat "absent" and "explicitly null" alike.
    pub fn value_of(&self, field: &str) -> FieldValue {
        match field {
            REMOTE_ID_FIELD => self
                .remote_id
                .as_ref()
                .map_or(FieldValue::Null, |id| FieldValue::Text(id.clone())),
            CREATED_AT_FIELD => self.created_at.map_or(FieldValue::Null, FieldValue::Integer),
            UPDATED_AT_FIELD => self.updated_at.map_or(FieldValue::Null, FieldValue::Integer),
            name => self.fields.get(name).cloned().unwrap_or(FieldValue::Null),
        }
    }

    /// Sets a named field, routing reserved names to their columns.
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) {
        let value = value.into();
        match field {
            REMOTE_ID_FIELD => {
                self.remote_id = match value {
                    FieldValue::Text(id) => Some(id),
                    _ => None,
                };
            }
            CREATED_AT_FIELD => {
                self.created_at = match value {
                    FieldValue::Integer(ms) => Some(ms),
                    _ => None,
                };
            }
            UPDATED_AT_FIELD => {
                self.updated_at = match value {
                    FieldValue::Integer(ms) => Some(ms),
                    _ => None,
                };
            }
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}
