use serde::Serialize;
use warp::http::StatusCode;

use crate::aggregation::types::HostCounts;
use crate::error_handling::types::{QueryError, StorageError};

/// API error payload
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
}

/// A handler failure and the status it maps to.
#[derive(Debug)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub message: String,
}

impl From<StorageError> for ApiFailure {
    fn from(err: StorageError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<QueryError> for ApiFailure {
    fn from(err: QueryError) -> Self {
        let status = match err {
            QueryError::Filter(_) => StatusCode::BAD_REQUEST,
            QueryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ConcurrencyPoint {
    pub time: String,
    pub total: u64,
    pub hosts: HostCounts,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ProgramCount {
    pub program: String,
    pub count: u64,
}
