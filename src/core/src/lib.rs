pub mod aggregation;
pub mod configuration;
pub mod error_handling;
pub mod ingestion;
pub mod reporting;
pub mod storage;
pub mod web_interface;

pub use aggregation::{Aggregator, CountSeries, TimeBucket};
pub use reporting::ReportBuilder;
pub use storage::{Filter, Predicate, SessionRecord, Storage};
