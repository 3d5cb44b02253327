//! Storage Trait
//!
//! This module defines the `Storage` trait, the store gateway every other
//! component queries through.
//!
//! Implementors are responsible for:
//! - Persisting flattened session records
//! - Answering conjunctive `Filter` queries, optionally projected and sorted
//! - Counting matches and listing distinct field values
//!
//! All methods block until the backend answers and return a `Result`;
//! failures are never retried here.

use crate::error_handling::types::StorageError;
use crate::storage::session_filter::Filter;
use crate::storage::types::{Field, FieldValue, SessionRecord};

/// The store gateway for session records.
pub trait Storage: Send + Sync {
    /// Persists every record or none of them. Returns the number stored.
    fn insert_records(&self, records: &[SessionRecord]) -> Result<usize, StorageError>;

    /// Retrieves matching records, sorted ascending by `sort` when given.
    fn find(
        &self,
        filter: &Filter,
        sort: Option<Field>,
    ) -> Result<Vec<SessionRecord>, StorageError>;

    /// Like `find`, but returns only the value of `field` for each match.
    fn find_field(
        &self,
        filter: &Filter,
        field: Field,
        sort: Option<Field>,
    ) -> Result<Vec<FieldValue>, StorageError>;

    /// Number of records matching `filter`.
    fn count(&self, filter: &Filter) -> Result<u64, StorageError>;

    /// Distinct values of `field` across the whole collection, ascending.
    fn distinct(&self, field: Field) -> Result<Vec<FieldValue>, StorageError>;
}
