//! List-rendering adapters over fetched result snapshots.
//!
//! # Responsibility
//! - Hold the latest query snapshot and re-run it on demand.
//! - Expose row counts and row content as pure pass-through accessors.
//!
//! # Invariants
//! - Adapters add no caching or transformation beyond the caller's row
//!   configurator; what the snapshot holds is what renders.

use crate::model::entity::Entity;
use crate::model::record::Record;
use crate::query::{sorted_request, FetchRequest};
use crate::session::Session;
use crate::store::StoreResult;
use std::marker::PhantomData;

/// An auto-refreshable query result snapshot for one entity type.
pub struct FetchedResults<E: Entity> {
    request: FetchRequest,
    records: Vec<Record>,
    _entity: PhantomData<E>,
}

impl<E: Entity> FetchedResults<E> {
    /// Results for an arbitrary fetch request. The snapshot starts empty
    /// until the first [`FetchedResults::refresh`].
    pub fn new(request: FetchRequest) -> Self {
        Self {
            request,
            records: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// Results for the entity's default sorted fetch.
    pub fn sorted() -> Self {
        Self::new(sorted_request::<E>())
    }

    /// Re-runs the query through the given session and replaces the
    /// snapshot.
    pub fn refresh(&mut self, session: &mut Session) -> StoreResult<()> {
        self.records = session.fetch_records::<E>(&self.request)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

/// Flat list adapter: one section, rows straight from the snapshot.
pub struct ResultsDataSource<E: Entity, Row, F: Fn(&Record) -> Row> {
    results: FetchedResults<E>,
    configure_row: F,
}

impl<E: Entity, Row, F: Fn(&Record) -> Row> ResultsDataSource<E, Row, F> {
    pub fn new(results: FetchedResults<E>, configure_row: F) -> Self {
        Self {
            results,
            configure_row,
        }
    }

    pub fn refresh(&mut self, session: &mut Session) -> StoreResult<()> {
        self.results.refresh(session)
    }

    pub fn row_count(&self) -> usize {
        self.results.len()
    }

    /// Builds the row for an index, or `None` past the end of the snapshot.
    pub fn row(&self, index: usize) -> Option<Row> {
        self.results.record(index).map(&self.configure_row)
    }
}

/// Sectioned list adapter: rows grouped by one section-key field, sections
/// ordered by first appearance in the (already sorted) snapshot.
pub struct SectionedResultsDataSource<E: Entity, Row, F: Fn(&Record) -> Row> {
    results: FetchedResults<E>,
    section_field: String,
    sections: Vec<(String, Vec<usize>)>,
    configure_row: F,
}

impl<E: Entity, Row, F: Fn(&Record) -> Row> SectionedResultsDataSource<E, Row, F> {
    pub fn new(
        results: FetchedResults<E>,
        section_field: impl Into<String>,
        configure_row: F,
    ) -> Self {
        Self {
            results,
            section_field: section_field.into(),
            sections: Vec::new(),
            configure_row,
        }
    }

    pub fn refresh(&mut self, session: &mut Session) -> StoreResult<()> {
        self.results.refresh(session)?;
        self.rebuild_sections();
        Ok(())
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn section_title(&self, section: usize) -> Option<&str> {
        self.sections.get(section).map(|(title, _)| title.as_str())
    }

    pub fn row_count(&self, section: usize) -> usize {
        self.sections
            .get(section)
            .map_or(0, |(_, rows)| rows.len())
    }

    pub fn row(&self, section: usize, index: usize) -> Option<Row> {
        let (_, rows) = self.sections.get(section)?;
        let record_index = *rows.get(index)?;
        self.results.record(record_index).map(&self.configure_row)
    }

    fn rebuild_sections(&mut self) {
        self.sections.clear();
        for (index, record) in self.results.records().iter().enumerate() {
            let title = record.value_of(&self.section_field).to_string();
            match self.sections.iter_mut().find(|(name, _)| *name == title) {
                Some((_, rows)) => rows.push(index),
                None => self.sections.push((title, vec![index])),
            }
        }
    }
}
