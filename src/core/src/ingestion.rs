//! Ingestion of nested `last` samples into the store.
//!
//! Input is shaped `host -> date -> time-of-day -> session index -> fields`.

pub mod normalizer;
pub mod types;

pub use normalizer::{ingest, ingest_file, normalize};
pub use types::{RawIngest, RawSession};
