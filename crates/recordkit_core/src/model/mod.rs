//! Generic record model shared by every entity type.
//!
//! # Responsibility
//! - Define the canonical persisted record shape and its field values.
//! - Define the capability traits entity types opt into.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId`.
//! - Within an entity type, `remote_id` is unique among persisted records.

pub mod entity;
pub mod record;
