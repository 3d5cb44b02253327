use std::collections::BTreeSet;

use log::{debug, info};

use crate::aggregation::types::{CountSeries, HostCounts, ProgramCounts, TimeBucket};
use crate::error_handling::types::StorageError;
use crate::storage::session_filter::{at_time, by_host, by_program};
use crate::storage::storage_trait::Storage;
use crate::storage::types::Field;

/// Counts sessions through a store gateway, one query per bucket or program.
///
/// Holds no state besides the gateway handle, so repeated calls against an
/// unchanged store give identical results.
pub struct Aggregator<'a> {
    storage: &'a dyn Storage,
}

impl<'a> Aggregator<'a> {
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    /// Every distinct sample time, bucketed and deduplicated, ascending.
    pub fn time_buckets(&self) -> Result<Vec<TimeBucket>, StorageError> {
        let buckets: BTreeSet<TimeBucket> = self
            .storage
            .distinct(Field::Time)?
            .iter()
            .filter_map(|v| v.as_time())
            .map(TimeBucket::containing)
            .collect();
        debug!("{} time bucket(s) discovered", buckets.len());
        Ok(buckets.into_iter().collect())
    }

    pub fn hosts(&self) -> Result<Vec<String>, StorageError> {
        self.distinct_text(Field::Host)
    }

    pub fn programs(&self) -> Result<Vec<String>, StorageError> {
        self.distinct_text(Field::Program)
    }

    fn distinct_text(&self, field: Field) -> Result<Vec<String>, StorageError> {
        Ok(self
            .storage
            .distinct(field)?
            .into_iter()
            .filter_map(|v| v.as_text().map(str::to_string))
            .collect())
    }

    /// Per-host session counts at each bucket, optionally restricted to hosts
    /// matching `host` (exact name or prefix).
    pub fn host_concurrency(
        &self,
        buckets: &[TimeBucket],
        host: Option<&str>,
    ) -> Result<CountSeries, StorageError> {
        let mut series = CountSeries::new();
        for bucket in buckets {
            // A stored instant too close to the calendar limits has no window.
            let mut filter = at_time(bucket.instant())
                .map_err(|e| StorageError::ReadFailed(e.to_string()))?;
            if let Some(prefix) = host {
                filter = filter.merge(by_host(prefix));
            }
            let mut counts = HostCounts::new();
            for value in self.storage.find_field(&filter, Field::Host, None)? {
                if let Some(name) = value.as_text() {
                    *counts.entry(name.to_string()).or_insert(0) += 1;
                }
            }
            series.insert(*bucket, counts);
        }
        info!("Counted host concurrency over {} bucket(s)", series.len());
        Ok(series)
    }

    /// Total number of records naming each program.
    pub fn program_popularity(&self, programs: &[String]) -> Result<ProgramCounts, StorageError> {
        let mut counts = ProgramCounts::new();
        for program in programs {
            counts.insert(program.clone(), self.storage.count(&by_program(program.as_str()))?);
        }
        info!("Counted {} program(s)", counts.len());
        Ok(counts)
    }
}
