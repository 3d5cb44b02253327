//! The query operation: raw predicates in, records or projected values out.

use log::debug;
use serde::Serialize;

use crate::error_handling::types::QueryError;
use crate::storage::session_filter::compose_raw;
use crate::storage::storage_trait::Storage;
use crate::storage::types::{Field, FieldValue, SessionRecord};

/// A query as supplied by a user: predicate name/value pairs plus optional
/// projection and sort field names.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub predicates: Vec<(String, String)>,
    pub restrict: Option<String>,
    pub sort: Option<String>,
}

impl QueryRequest {
    pub fn predicate<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.predicates.push((name.into(), value.into()));
        self
    }

    pub fn restrict<S: Into<String>>(mut self, field: S) -> Self {
        self.restrict = Some(field.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    Records(Vec<SessionRecord>),
    Values(Vec<FieldValue>),
}

impl QueryResult {
    pub fn len(&self) -> usize {
        match self {
            QueryResult::Records(r) => r.len(),
            QueryResult::Values(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run `request` against `storage`. Results are sorted by `time` unless
/// another sort field is named.
pub fn query(storage: &dyn Storage, request: &QueryRequest) -> Result<QueryResult, QueryError> {
    let filter = compose_raw(
        request
            .predicates
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str())),
    )?;
    let sort = match request.sort {
        Some(ref name) => name.parse::<Field>()?,
        None => Field::Time,
    };
    let restrict = request
        .restrict
        .as_deref()
        .map(str::parse::<Field>)
        .transpose()?;
    debug!("Query {:?} restrict={:?} sort={}", filter, restrict, sort);

    match restrict {
        Some(field) => Ok(QueryResult::Values(storage.find_field(
            &filter,
            field,
            Some(sort),
        )?)),
        None => Ok(QueryResult::Records(storage.find(&filter, Some(sort))?)),
    }
}
