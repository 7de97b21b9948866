//! Capability traits for entity types.
//!
//! # Responsibility
//! - Declare what a type must provide to participate in generic fetching
//!   (name, default sort, default filter).
//! - Declare the shape of deserialized remote payloads.
//!
//! # Invariants
//! - `entity_name()` is stable; records persisted under it stay readable.

use crate::query::{Filter, SortKey};

/// An entity type that can be stored and queried generically.
///
/// Implementations are zero-sized marker types; all members are associated
/// functions because records themselves are dynamic field maps.
pub trait Entity {
    /// Entity-type name used to tag persisted records.
    fn entity_name() -> &'static str;

    /// Sort keys applied by default sorted fetches. Empty means unsorted.
    fn default_sort() -> Vec<SortKey> {
        Vec::new()
    }

    /// Baseline filter every default fetch starts from.
    fn default_filter() -> Filter {
        Filter::All
    }
}

/// A deserialized payload describing a record's counterpart in an external
/// system.
///
/// `remote_id` is optional at the trait level because payloads may be
/// partially populated; the reconciler treats an absent id as a caller
/// contract violation.
pub trait RemoteInfo {
    /// External-system unique identifier.
    fn remote_id(&self) -> Option<&str>;

    /// Creation instant in epoch milliseconds, when the remote system
    /// reports one.
    fn created_at(&self) -> Option<i64> {
        None
    }

    /// Last-update instant in epoch milliseconds.
    fn updated_at(&self) -> Option<i64> {
        None
    }
}
