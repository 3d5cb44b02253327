use std::collections::HashSet;

use log::{info, warn};

use crate::aggregation::aggregator::Aggregator;
use crate::aggregation::types::{CountSeries, ProgramCounts, TimeBucket};
use crate::error_handling::types::{ReportError, StorageError};
use crate::reporting::renderer::Renderer;
use crate::reporting::types::{output_key, Chart, ChartData, FailurePolicy, ReportSummary};
use crate::storage::storage_trait::Storage;

/// Output key of the all-hosts chart.
pub const COMBINED_KEY: &str = "all-hosts";
/// Output key of the program popularity chart.
pub const PROGRAMS_KEY: &str = "programs";

/// Builds every report series from one store gateway handle.
///
/// Discovered buckets, hosts and programs, and both aggregations, are
/// computed on first use and kept for the lifetime of the builder. Build a
/// new instance to see fresh data.
///
/// # Fields Overview
///
/// - `query_times`: distinct sample times, bucketed
/// - `machines`: distinct host names
/// - `programs`: distinct program names
/// - `counted_hosts`: per-bucket host tallies over `query_times`
/// - `counted_programs`: total records per program
pub struct ReportBuilder<'a> {
    aggregator: Aggregator<'a>,
    query_times: Option<Vec<TimeBucket>>,
    machines: Option<Vec<String>>,
    programs: Option<Vec<String>>,
    counted_hosts: Option<CountSeries>,
    counted_programs: Option<ProgramCounts>,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self {
            aggregator: Aggregator::new(storage),
            query_times: None,
            machines: None,
            programs: None,
            counted_hosts: None,
            counted_programs: None,
        }
    }

    pub fn query_times(&mut self) -> Result<&[TimeBucket], StorageError> {
        let times = match self.query_times.take() {
            Some(times) => times,
            None => self.aggregator.time_buckets()?,
        };
        Ok(self.query_times.insert(times).as_slice())
    }

    pub fn machines(&mut self) -> Result<&[String], StorageError> {
        let machines = match self.machines.take() {
            Some(machines) => machines,
            None => self.aggregator.hosts()?,
        };
        Ok(self.machines.insert(machines).as_slice())
    }

    pub fn programs(&mut self) -> Result<&[String], StorageError> {
        let programs = match self.programs.take() {
            Some(programs) => programs,
            None => self.aggregator.programs()?,
        };
        Ok(self.programs.insert(programs).as_slice())
    }

    pub fn counted_hosts(&mut self) -> Result<&CountSeries, StorageError> {
        let counted = match self.counted_hosts.take() {
            Some(counted) => counted,
            None => {
                let times = self.query_times()?.to_vec();
                self.aggregator.host_concurrency(&times, None)?
            }
        };
        Ok(&*self.counted_hosts.insert(counted))
    }

    pub fn counted_programs(&mut self) -> Result<&ProgramCounts, StorageError> {
        let counted = match self.counted_programs.take() {
            Some(counted) => counted,
            None => {
                let programs = self.programs()?.to_vec();
                self.aggregator.program_popularity(&programs)?
            }
        };
        Ok(&*self.counted_programs.insert(counted))
    }

    /// Sessions on `host` at every known bucket, 0 where it was absent.
    pub fn host_series(&mut self, host: &str) -> Result<Vec<(TimeBucket, u64)>, StorageError> {
        Ok(self.counted_hosts()?.host_points(host))
    }

    /// Sessions across all hosts at every known bucket.
    pub fn combined_series(&mut self) -> Result<Vec<(TimeBucket, u64)>, StorageError> {
        Ok(self.counted_hosts()?.total_points())
    }

    pub fn host_chart(&mut self, host: &str) -> Result<Chart, StorageError> {
        Ok(line_chart(
            format!("Concurrent sessions on {}", host),
            self.host_series(host)?,
        ))
    }

    pub fn combined_chart(&mut self) -> Result<Chart, StorageError> {
        Ok(line_chart(
            "Concurrent sessions, all hosts".to_string(),
            self.combined_series()?,
        ))
    }

    pub fn programs_chart(&mut self) -> Result<Chart, StorageError> {
        let bars = self
            .counted_programs()?
            .iter()
            .map(|(program, count)| (program.clone(), *count))
            .collect();
        Ok(Chart {
            title: "Program popularity".to_string(),
            x_label: "program".to_string(),
            y_label: "occurrences".to_string(),
            data: ChartData::Bar(bars),
        })
    }

    /// Render one chart per host, one for all hosts combined, and one for
    /// program popularity.
    ///
    /// Host and combined charts share one aggregation; when it fails the
    /// failure is reported once, under the combined target.
    pub fn run(
        &mut self,
        renderer: &mut dyn Renderer,
        policy: FailurePolicy,
    ) -> Result<ReportSummary, ReportError> {
        let mut summary = ReportSummary::default();
        let mut keys = OutputKeys::default();
        let machines = self.machines()?.to_vec();
        info!("Building report for {} host(s)", machines.len());

        match self.counted_hosts().map(|_| ()) {
            Ok(()) => {
                for host in &machines {
                    let key = keys.claim(output_key("host", host));
                    let outcome = self
                        .host_chart(host)
                        .map_err(ReportError::from)
                        .and_then(|chart| {
                            renderer.render(&chart, &key).map_err(ReportError::from)
                        });
                    record_outcome(&mut summary, host, outcome, policy)?;
                }

                let key = keys.claim(COMBINED_KEY.to_string());
                let outcome = self
                    .combined_chart()
                    .map_err(ReportError::from)
                    .and_then(|chart| renderer.render(&chart, &key).map_err(ReportError::from));
                record_outcome(&mut summary, COMBINED_KEY, outcome, policy)?;
            }
            Err(e) => record_outcome(&mut summary, COMBINED_KEY, Err(e.into()), policy)?,
        }

        let key = keys.claim(PROGRAMS_KEY.to_string());
        let outcome = self
            .programs_chart()
            .map_err(ReportError::from)
            .and_then(|chart| renderer.render(&chart, &key).map_err(ReportError::from));
        record_outcome(&mut summary, PROGRAMS_KEY, outcome, policy)?;

        info!(
            "Report finished: {} artifact(s) written, {} skipped",
            summary.written.len(),
            summary.skipped.len()
        );
        Ok(summary)
    }
}

// Output keys already handed out during one run. Sanitising can map distinct
// names onto one key; later claimants get a numeric suffix.
#[derive(Default)]
struct OutputKeys {
    used: HashSet<String>,
}

impl OutputKeys {
    fn claim(&mut self, key: String) -> String {
        if self.used.insert(key.clone()) {
            return key;
        }
        let mut n = 2;
        let unique = loop {
            let candidate = format!("{}-{}", key, n);
            if self.used.insert(candidate.clone()) {
                break candidate;
            }
            n += 1;
        };
        warn!("Output key {} already used in this run, writing {}", key, unique);
        unique
    }
}

fn line_chart(title: String, points: Vec<(TimeBucket, u64)>) -> Chart {
    Chart {
        title,
        x_label: "time".to_string(),
        y_label: "sessions".to_string(),
        data: ChartData::Line(
            points
                .into_iter()
                .map(|(bucket, count)| (bucket.instant(), count))
                .collect(),
        ),
    }
}

fn record_outcome(
    summary: &mut ReportSummary,
    target: &str,
    outcome: Result<std::path::PathBuf, ReportError>,
    policy: FailurePolicy,
) -> Result<(), ReportError> {
    match outcome {
        Ok(path) => {
            summary.written.push(path);
            Ok(())
        }
        Err(e) if policy == FailurePolicy::Skip => {
            warn!("Skipping report target {}: {}", target, e);
            summary.skipped.push((target.to_string(), e.to_string()));
            Ok(())
        }
        Err(e) => Err(e),
    }
}
