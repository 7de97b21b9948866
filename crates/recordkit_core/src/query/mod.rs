//! Filters, sort keys and fetch requests.
//!
//! # Responsibility
//! - Compose a type's default filter with caller filters (logical AND).
//! - Evaluate filters against in-memory records and order fetch results.
//!
//! # Invariants
//! - Filter construction is pure data; evaluation never performs I/O.
//! - `sorted_request_with` always preserves the entity's default sort.

use crate::model::entity::Entity;
use crate::model::record::{FieldValue, Record, REMOTE_ID_FIELD};

/// A predicate selecting which records match a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every record.
    All,
    /// Field equals the given value. Missing fields read as `Null`.
    Eq { field: String, value: FieldValue },
    /// Text field contains the given substring. Non-text fields never match.
    Contains { field: String, needle: String },
    /// Both sub-filters match.
    And(Box<Filter>, Box<Filter>),
}

impl Filter {
    /// Equality test on a single field.
    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Filter {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Substring test on a text field.
    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Filter {
        Filter::Contains {
            field: field.into(),
            needle: needle.into(),
        }
    }

    /// Logical AND of two filters.
    pub fn and(self, other: Filter) -> Filter {
        Filter::And(Box::new(self), Box::new(other))
    }

    /// Equality test on the reserved remote-identity field.
    pub fn remote_identity(id: impl Into<String>) -> Filter {
        Filter::eq(REMOTE_ID_FIELD, id.into())
    }

    /// Evaluates this filter against one record.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq { field, value } => record.value_of(field) == *value,
            Filter::Contains { field, needle } => match record.value_of(field) {
                FieldValue::Text(text) => text.contains(needle.as_str()),
                _ => false,
            },
            Filter::And(a, b) => a.matches(record) && b.matches(record),
        }
    }
}

/// One sort criterion applied to fetch results.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub ascending: bool,
}

impl SortKey {
    pub fn ascending(field: impl Into<String>) -> SortKey {
        SortKey {
            field: field.into(),
            ascending: true,
        }
    }

    pub fn descending(field: impl Into<String>) -> SortKey {
        SortKey {
            field: field.into(),
            ascending: false,
        }
    }
}

/// A bounded, ordered query against one entity type.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub filter: Option<Filter>,
    pub sort: Vec<SortKey>,
    pub limit: Option<usize>,
}

impl FetchRequest {
    pub fn new(filter: Filter) -> FetchRequest {
        FetchRequest {
            filter: Some(filter),
            sort: Vec::new(),
            limit: None,
        }
    }

    pub fn sorted_by(mut self, sort: Vec<SortKey>) -> FetchRequest {
        self.sort = sort;
        self
    }

    pub fn limited_to(mut self, limit: usize) -> FetchRequest {
        self.limit = Some(limit);
        self
    }
}

/// Default fetch request for an entity type: default filter, default sort.
pub fn sorted_request<E: Entity>() -> FetchRequest {
    FetchRequest::new(E::default_filter()).sorted_by(E::default_sort())
}

/// Default fetch request narrowed by an additional filter.
///
/// The caller filter is ANDed with the entity's default filter so the
/// baseline can never be bypassed.
pub fn sorted_request_with<E: Entity>(filter: Filter) -> FetchRequest {
    FetchRequest::new(E::default_filter().and(filter)).sorted_by(E::default_sort())
}

/// Orders records in place according to the given sort keys.
///
/// Later keys break ties left by earlier ones. The underlying sort is
/// stable, so equal records keep their fetch order.
pub fn sort_records(records: &mut [Record], sort: &[SortKey]) {
    if sort.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        for key in sort {
            let ordering = a.value_of(&key.field).compare(&b.value_of(&key.field));
            let ordering = if key.ascending {
                ordering
            } else {
                ordering.reverse()
            };
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}

#[cfg(test)]
mod tests {
    use super::{sort_records, Filter, SortKey};
    use crate::model::record::Record;

    fn user(email: &str) -> Record {
        let mut record = Record::new("User");
        record.set("email", email);
        record
    }

    #[test]
    fn all_matches_everything() {
        assert!(Filter::All.matches(&user("a@b.c")));
    }

    #[test]
    fn equality_filter_matches_exact_value() {
        let filter = Filter::eq("email", "a@b.c");
        assert!(filter.matches(&user("a@b.c")));
        assert!(!filter.matches(&user("x@y.z")));
    }

    #[test]
    fn contains_filter_requires_text_field() {
        let filter = Filter::contains("email", "bcd");
        assert!(filter.matches(&user("abcd@at.es")));
        assert!(!filter.matches(&user("xyz@at.es")));

        let mut numeric = Record::new("User");
        numeric.set("email", 7i64);
        assert!(!filter.matches(&numeric));
    }

    #[test]
    fn and_requires_both_sides() {
        let filter = Filter::contains("email", "bcd").and(Filter::eq("email", "bcd@at.es"));
        assert!(filter.matches(&user("bcd@at.es")));
        assert!(!filter.matches(&user("abcd@at.es")));
    }

    #[test]
    fn remote_identity_filter_targets_remote_id() {
        let mut record = Record::new("User");
        record.remote_id = Some("srv-9".into());
        assert!(Filter::remote_identity("srv-9").matches(&record));
        assert!(!Filter::remote_identity("srv-8").matches(&record));
    }

    #[test]
    fn sort_orders_ascending_then_descending() {
        let mut records = vec![user("bcd@at.es"), user("abcd@at.es")];
        sort_records(&mut records, &[SortKey::ascending("email")]);
        assert_eq!(records[0].value_of("email"), "abcd@at.es".into());

        sort_records(&mut records, &[SortKey::descending("email")]);
        assert_eq!(records[0].value_of("email"), "bcd@at.es".into());
    }
}
