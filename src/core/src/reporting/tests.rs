use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{NaiveDate, NaiveDateTime};
use tempfile::TempDir;

use super::report_builder::{ReportBuilder, COMBINED_KEY, PROGRAMS_KEY};
use super::*;
use crate::aggregation::TimeBucket;
use crate::error_handling::types::{RenderError, ReportError, StorageError};
use crate::ingestion::{ingest, RawIngest};
use crate::storage::database_storage::DatabaseStorage;
use crate::storage::file_storage::FileStorage;
use crate::storage::session_filter::{by_host, Filter};
use crate::storage::{Field, FieldValue, SessionRecord, Storage};

fn t(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 2)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

fn record(host: &str, user: &str, program: &str, time: NaiveDateTime) -> SessionRecord {
    SessionRecord {
        host: host.into(),
        time,
        user: user.into(),
        program: program.into(),
        cpu: "0".into(),
        tty: "pts/0".into(),
        from: "-".into(),
        login: "10:00".into(),
        idle: "0".into(),
    }
}

/// Keeps every chart instead of drawing it.
#[derive(Default)]
struct RecordingRenderer {
    charts: Vec<(String, Chart)>,
    fail_on: Option<String>,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, chart: &Chart, output_key: &str) -> Result<PathBuf, RenderError> {
        if self.fail_on.as_deref() == Some(output_key) {
            return Err(RenderError::EmptySeries(chart.title.clone()));
        }
        self.charts.push((output_key.to_string(), chart.clone()));
        Ok(PathBuf::from(output_key))
    }
}

/// Delegates to a file store and counts calls to `distinct`.
struct CountingStorage {
    inner: FileStorage,
    distinct_calls: AtomicUsize,
}

impl Storage for CountingStorage {
    fn insert_records(&self, records: &[SessionRecord]) -> Result<usize, StorageError> {
        self.inner.insert_records(records)
    }

    fn find(&self, filter: &Filter, sort: Option<Field>) -> Result<Vec<SessionRecord>, StorageError> {
        self.inner.find(filter, sort)
    }

    fn find_field(
        &self,
        filter: &Filter,
        field: Field,
        sort: Option<Field>,
    ) -> Result<Vec<FieldValue>, StorageError> {
        self.inner.find_field(filter, field, sort)
    }

    fn count(&self, filter: &Filter) -> Result<u64, StorageError> {
        self.inner.count(filter)
    }

    fn distinct(&self, field: Field) -> Result<Vec<FieldValue>, StorageError> {
        self.distinct_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.distinct(field)
    }
}

/// Lists and counts normally but cannot answer projected queries.
struct NoProjectionStorage {
    inner: FileStorage,
    find_field_calls: AtomicUsize,
}

impl Storage for NoProjectionStorage {
    fn insert_records(&self, records: &[SessionRecord]) -> Result<usize, StorageError> {
        self.inner.insert_records(records)
    }

    fn find(&self, filter: &Filter, sort: Option<Field>) -> Result<Vec<SessionRecord>, StorageError> {
        self.inner.find(filter, sort)
    }

    fn find_field(
        &self,
        _: &Filter,
        _: Field,
        _: Option<Field>,
    ) -> Result<Vec<FieldValue>, StorageError> {
        self.find_field_calls.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::ReadFailed("projection unavailable".into()))
    }

    fn count(&self, filter: &Filter) -> Result<u64, StorageError> {
        self.inner.count(filter)
    }

    fn distinct(&self, field: Field) -> Result<Vec<FieldValue>, StorageError> {
        self.inner.distinct(field)
    }
}

struct UnreachableStorage;

impl Storage for UnreachableStorage {
    fn insert_records(&self, _: &[SessionRecord]) -> Result<usize, StorageError> {
        Err(StorageError::ConnectionFailed("down".into()))
    }

    fn find(&self, _: &Filter, _: Option<Field>) -> Result<Vec<SessionRecord>, StorageError> {
        Err(StorageError::ConnectionFailed("down".into()))
    }

    fn find_field(
        &self,
        _: &Filter,
        _: Field,
        _: Option<Field>,
    ) -> Result<Vec<FieldValue>, StorageError> {
        Err(StorageError::ConnectionFailed("down".into()))
    }

    fn count(&self, _: &Filter) -> Result<u64, StorageError> {
        Err(StorageError::ConnectionFailed("down".into()))
    }

    fn distinct(&self, _: Field) -> Result<Vec<FieldValue>, StorageError> {
        Err(StorageError::ConnectionFailed("down".into()))
    }
}

fn two_host_store() -> (TempDir, FileStorage) {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::new(dir.path()).unwrap();
    storage
        .insert_records(&[
            record("A", "alice", "bash", t(10, 0, 0)),
            record("B", "bob", "vim", t(10, 0, 0)),
            record("A", "alice", "bash", t(10, 0, 30)),
        ])
        .unwrap();
    (dir, storage)
}

#[test]
fn test_end_to_end_single_session() {
    let dir = TempDir::new().unwrap();
    let storage = DatabaseStorage::new_file(dir.path().join("e2e.sqlite3")).unwrap();
    let input: RawIngest = serde_json::from_str(
        r#"{"host1": {"01/02/20": {"10:00:00": {"0": {"user":"u1","prog":"bash","jcpu":"0","tty":"pts/0","from":"-","login":"10:00","idle":"0"}}}}}"#,
    )
    .unwrap();
    assert_eq!(ingest(&storage, &input).unwrap(), 1);

    let found = storage.find(&by_host("host1"), Some(Field::Time)).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].user, "u1");

    let mut builder = ReportBuilder::new(&storage);
    let bucket = TimeBucket::containing(t(10, 0, 0));
    assert_eq!(builder.query_times().unwrap(), &[bucket]);
    let counts = builder.counted_hosts().unwrap().get(&bucket).unwrap().clone();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts.get("host1"), Some(&1));
}

#[test]
fn test_absent_host_is_backfilled_with_zero() {
    let (_dir, storage) = two_host_store();
    let mut builder = ReportBuilder::new(&storage);
    let b = builder.host_series("B").unwrap();
    assert_eq!(
        b,
        vec![
            (TimeBucket::containing(t(10, 0, 0)), 1),
            (TimeBucket::containing(t(10, 0, 30)), 0)
        ]
    );
    let combined: Vec<u64> = builder
        .combined_series()
        .unwrap()
        .into_iter()
        .map(|(_, n)| n)
        .collect();
    assert_eq!(combined, vec![2, 1]);
}

#[test]
fn test_caches_are_filled_once_per_builder() {
    let dir = TempDir::new().unwrap();
    let storage = CountingStorage {
        inner: FileStorage::new(dir.path()).unwrap(),
        distinct_calls: AtomicUsize::new(0),
    };
    storage
        .insert_records(&[record("A", "alice", "bash", t(10, 0, 0))])
        .unwrap();

    let mut builder = ReportBuilder::new(&storage);
    builder.counted_hosts().unwrap();
    builder.counted_hosts().unwrap();
    builder.machines().unwrap();
    builder.machines().unwrap();
    builder.counted_programs().unwrap();
    builder.counted_programs().unwrap();
    // time, host, program
    assert_eq!(storage.distinct_calls.load(Ordering::SeqCst), 3);

    // New data is invisible to the existing builder but seen by a fresh one.
    storage
        .insert_records(&[record("C", "carol", "zsh", t(11, 0, 0))])
        .unwrap();
    assert_eq!(builder.machines().unwrap().len(), 1);
    assert_eq!(ReportBuilder::new(&storage).machines().unwrap().len(), 2);
}

#[test]
fn test_fresh_builders_agree() {
    let (_dir, storage) = two_host_store();
    let mut first = ReportBuilder::new(&storage);
    let mut second = ReportBuilder::new(&storage);
    assert_eq!(
        first.counted_hosts().unwrap(),
        second.counted_hosts().unwrap()
    );
    assert_eq!(
        first.counted_programs().unwrap(),
        second.counted_programs().unwrap()
    );
}

#[test]
fn test_run_renders_every_target() {
    let (_dir, storage) = two_host_store();
    let mut renderer = RecordingRenderer::default();
    let summary = ReportBuilder::new(&storage)
        .run(&mut renderer, FailurePolicy::Abort)
        .unwrap();

    let keys: Vec<&str> = renderer.charts.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["host-A", "host-B", COMBINED_KEY, PROGRAMS_KEY]);
    assert_eq!(summary.written.len(), 4);
    assert!(summary.skipped.is_empty());

    let (_, programs) = &renderer.charts[3];
    assert_eq!(
        programs.data,
        ChartData::Bar(vec![("bash".into(), 2), ("vim".into(), 1)])
    );
    let (_, host_b) = &renderer.charts[1];
    assert_eq!(
        host_b.data,
        ChartData::Line(vec![(t(10, 0, 0), 1), (t(10, 0, 30), 0)])
    );
}

#[test]
fn test_run_failure_policies() {
    let (_dir, storage) = two_host_store();

    let mut renderer = RecordingRenderer {
        fail_on: Some("host-A".into()),
        ..Default::default()
    };
    let summary = ReportBuilder::new(&storage)
        .run(&mut renderer, FailurePolicy::Skip)
        .unwrap();
    assert_eq!(summary.written.len(), 3);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].0, "A");

    let mut renderer = RecordingRenderer {
        fail_on: Some("host-A".into()),
        ..Default::default()
    };
    let err = ReportBuilder::new(&storage)
        .run(&mut renderer, FailurePolicy::Abort)
        .unwrap_err();
    assert!(matches!(err, ReportError::Render(_)));
    assert!(renderer.charts.is_empty());
}

#[test]
fn test_gateway_failure_propagates() {
    let storage = UnreachableStorage;
    let mut renderer = RecordingRenderer::default();
    let err = ReportBuilder::new(&storage)
        .run(&mut renderer, FailurePolicy::Skip)
        .unwrap_err();
    assert!(matches!(
        err,
        ReportError::Storage(StorageError::ConnectionFailed(_))
    ));
}

#[test]
fn test_host_aggregation_failure_is_reported_once() {
    let dir = TempDir::new().unwrap();
    let storage = NoProjectionStorage {
        inner: FileStorage::new(dir.path()).unwrap(),
        find_field_calls: AtomicUsize::new(0),
    };
    storage
        .insert_records(&[
            record("A", "alice", "bash", t(10, 0, 0)),
            record("B", "bob", "vim", t(10, 0, 0)),
            record("C", "carol", "vim", t(10, 0, 30)),
        ])
        .unwrap();

    let mut renderer = RecordingRenderer::default();
    let summary = ReportBuilder::new(&storage)
        .run(&mut renderer, FailurePolicy::Skip)
        .unwrap();
    assert_eq!(storage.find_field_calls.load(Ordering::SeqCst), 1);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].0, COMBINED_KEY);
    let keys: Vec<&str> = renderer.charts.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec![PROGRAMS_KEY]);

    let mut renderer = RecordingRenderer::default();
    let err = ReportBuilder::new(&storage)
        .run(&mut renderer, FailurePolicy::Abort)
        .unwrap_err();
    assert!(matches!(err, ReportError::Storage(StorageError::ReadFailed(_))));
    assert!(renderer.charts.is_empty());
}

#[test]
fn test_colliding_output_keys_stay_distinct() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::new(dir.path()).unwrap();
    storage
        .insert_records(&[
            record("a/b", "alice", "bash", t(10, 0, 0)),
            record("a:b", "bob", "bash", t(10, 0, 0)),
        ])
        .unwrap();

    let mut renderer = RecordingRenderer::default();
    let summary = ReportBuilder::new(&storage)
        .run(&mut renderer, FailurePolicy::Abort)
        .unwrap();
    let keys: Vec<&str> = renderer.charts.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["host-a_b", "host-a_b-2", COMBINED_KEY, PROGRAMS_KEY]);
    assert_eq!(summary.written.len(), 4);
}

#[test]
fn test_svg_report_on_disk() {
    let (dir, storage) = two_host_store();
    let mut renderer = SvgRenderer::new(dir.path().join("reports")).unwrap();
    let summary = ReportBuilder::new(&storage)
        .run(&mut renderer, FailurePolicy::Abort)
        .unwrap();
    for name in ["host-A.svg", "host-B.svg", "all-hosts.svg", "programs.svg"] {
        assert!(renderer.output_dir().join(name).is_file(), "missing {}", name);
    }
    assert_eq!(summary.written.len(), 4);
}
