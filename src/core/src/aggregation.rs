//! Time-bucketed counting over the store gateway.

pub mod aggregator;
pub mod types;

pub use aggregator::Aggregator;
pub use types::{CountSeries, HostCounts, ProgramCounts, TimeBucket, BUCKET_SECS};
