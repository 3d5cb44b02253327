//! Storage subsystem
//!
//! This module provides the store gateway for session records and the
//! predicate composer used to query it.
//!
//! Components:
//! - `storage_trait`: the Storage trait defining a uniform API.
//! - `types`: session records and projectable fields.
//! - `session_filter`: predicate composition into conjunctive filters.
//! - `database_storage`: ORM-based SQLite implementation using SeaORM.
//! - `file_storage`: JSON-lines implementation for simple persistence and inspection.
//! - `db_entities`: SeaORM entity models for the database backend.
//! - `query`: the user-facing query operation over raw predicates.

pub mod database_storage;
pub mod db_entities;
pub mod file_storage;
pub mod query;
pub mod session_filter;
pub mod storage_trait;
pub mod types;

pub use session_filter::{compose, compose_raw, Filter, Predicate};
pub use storage_trait::Storage;
pub use types::{Field, FieldValue, SessionRecord};
