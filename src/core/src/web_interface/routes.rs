//! Request handlers behind the HTTP routes.
//!
//! Handlers are plain blocking functions over a store gateway; the server
//! runs them on the blocking pool.

use std::collections::HashMap;

use crate::aggregation::aggregator::Aggregator;
use crate::aggregation::types::CountSeries;
use crate::reporting::report_builder::ReportBuilder;
use crate::storage::query::{query, QueryRequest, QueryResult};
use crate::storage::storage_trait::Storage;
use crate::web_interface::types::{ApiFailure, ConcurrencyPoint, ProgramCount};

/// GET /api/records
///
/// `restrict` and `sort` are field names; every other parameter is a predicate.
pub fn records(
    storage: &dyn Storage,
    params: &HashMap<String, String>,
) -> Result<QueryResult, ApiFailure> {
    let mut request = QueryRequest::default();
    let mut names: Vec<&String> = params.keys().collect();
    names.sort();
    for name in names {
        let value = &params[name];
        match name.as_str() {
            "restrict" => request.restrict = Some(value.clone()),
            "sort" => request.sort = Some(value.clone()),
            _ => request.predicates.push((name.clone(), value.clone())),
        }
    }
    Ok(query(storage, &request)?)
}

/// GET /api/hosts
pub fn hosts(storage: &dyn Storage) -> Result<Vec<String>, ApiFailure> {
    Ok(ReportBuilder::new(storage).machines()?.to_vec())
}

/// GET /api/programs
pub fn programs(storage: &dyn Storage) -> Result<Vec<String>, ApiFailure> {
    Ok(ReportBuilder::new(storage).programs()?.to_vec())
}

/// GET /api/concurrency
pub fn concurrency(
    storage: &dyn Storage,
    host: Option<&str>,
) -> Result<Vec<ConcurrencyPoint>, ApiFailure> {
    let mut builder = ReportBuilder::new(storage);
    let series = match host {
        None => builder.counted_hosts()?.clone(),
        Some(prefix) => {
            let times = builder.query_times()?.to_vec();
            Aggregator::new(storage).host_concurrency(&times, Some(prefix))?
        }
    };
    Ok(points(&series))
}

fn points(series: &CountSeries) -> Vec<ConcurrencyPoint> {
    series
        .iter()
        .map(|(bucket, hosts)| ConcurrencyPoint {
            time: bucket.to_string(),
            total: hosts.values().sum(),
            hosts: hosts.clone(),
        })
        .collect()
}

/// GET /api/popularity
pub fn popularity(storage: &dyn Storage) -> Result<Vec<ProgramCount>, ApiFailure> {
    Ok(ReportBuilder::new(storage)
        .counted_programs()?
        .iter()
        .map(|(program, count)| ProgramCount {
            program: program.clone(),
            count: *count,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::file_storage::FileStorage;
    use crate::storage::types::SessionRecord;
    use chrono::NaiveDate;
    use tempfile::TempDir;
    use warp::http::StatusCode;

    fn seeded() -> (TempDir, FileStorage) {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        let at = |s: u32| {
            NaiveDate::from_ymd_opt(2020, 1, 2)
                .unwrap()
                .and_hms_opt(10, 0, s)
                .unwrap()
        };
        let records: Vec<SessionRecord> = [
            ("unix1.andrew", "alice", "bash", 0),
            ("unix2.andrew", "bob", "vim", 1),
            ("linux.gp", "carol", "bash", 2),
        ]
        .iter()
        .map(|(host, user, program, s)| SessionRecord {
            host: host.to_string(),
            time: at(*s),
            user: user.to_string(),
            program: program.to_string(),
            cpu: "0".into(),
            tty: "pts/0".into(),
            from: "-".into(),
            login: "10:00".into(),
            idle: "0".into(),
        })
        .collect();
        storage.insert_records(&records).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_records_params() {
        let (_dir, storage) = seeded();
        let params = HashMap::from([
            ("host".to_string(), "unix".to_string()),
            ("restrict".to_string(), "user".to_string()),
        ]);
        let result = records(&storage, &params).unwrap();
        assert_eq!(serde_json::to_value(&result).unwrap(), serde_json::json!(["alice", "bob"]));
    }

    #[test]
    fn test_records_bad_predicate_is_client_error() {
        let (_dir, storage) = seeded();
        let params = HashMap::from([("shell".to_string(), "bash".to_string())]);
        let failure = records(&storage, &params).unwrap_err();
        assert_eq!(failure.status, StatusCode::BAD_REQUEST);
        assert!(failure.message.contains("shell"));
    }

    #[test]
    fn test_concurrency_points() {
        let (_dir, storage) = seeded();
        let all = concurrency(&storage, None).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].time, "2020-01-02T10:00:00");
        assert_eq!(all[0].total, 3);

        let unix = concurrency(&storage, Some("unix")).unwrap();
        assert_eq!(unix[0].total, 2);
        assert!(!unix[0].hosts.contains_key("linux.gp"));
    }

    #[test]
    fn test_listing_and_popularity() {
        let (_dir, storage) = seeded();
        assert_eq!(hosts(&storage).unwrap(), vec!["linux.gp", "unix1.andrew", "unix2.andrew"]);
        assert_eq!(programs(&storage).unwrap(), vec!["bash", "vim"]);
        assert_eq!(
            popularity(&storage).unwrap(),
            vec![
                ProgramCount {
                    program: "bash".into(),
                    count: 2
                },
                ProgramCount {
                    program: "vim".into(),
                    count: 1
                }
            ]
        );
    }
}
