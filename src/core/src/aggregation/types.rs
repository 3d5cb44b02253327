use std::collections::BTreeMap;
use std::fmt;

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::storage::types::DISPLAY_TIME_FORMAT;

/// Width of a sampling bucket in seconds.
pub const BUCKET_SECS: i64 = 5;

/// A sampling instant: an observed timestamp with its seconds rounded down
/// to a multiple of `BUCKET_SECS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TimeBucket(NaiveDateTime);

impl TimeBucket {
    pub fn containing(time: NaiveDateTime) -> Self {
        let excess = i64::from(time.second()) % BUCKET_SECS;
        let floored = time - Duration::seconds(excess);
        Self(floored.with_nanosecond(0).unwrap_or(floored))
    }

    pub fn instant(&self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DISPLAY_TIME_FORMAT))
    }
}

/// Host name to number of sessions seen.
pub type HostCounts = BTreeMap<String, u64>;

/// Program name to number of records naming it.
pub type ProgramCounts = BTreeMap<String, u64>;

/// Per-bucket host tallies, ordered by time.
///
/// Every queried bucket has an entry, even when nothing matched it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountSeries {
    buckets: BTreeMap<TimeBucket, HostCounts>,
}

impl CountSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bucket: TimeBucket, counts: HostCounts) {
        self.buckets.insert(bucket, counts);
    }

    pub fn get(&self, bucket: &TimeBucket) -> Option<&HostCounts> {
        self.buckets.get(bucket)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TimeBucket, &HostCounts)> {
        self.buckets.iter()
    }

    /// Count for `host` at every bucket, 0 where the host was not seen.
    pub fn host_points(&self, host: &str) -> Vec<(TimeBucket, u64)> {
        self.buckets
            .iter()
            .map(|(bucket, counts)| (*bucket, counts.get(host).copied().unwrap_or(0)))
            .collect()
    }

    /// Sum over all hosts at every bucket.
    pub fn total_points(&self) -> Vec<(TimeBucket, u64)> {
        self.buckets
            .iter()
            .map(|(bucket, counts)| (*bucket, counts.values().sum()))
            .collect()
    }
}
