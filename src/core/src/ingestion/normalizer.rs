use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use log::{debug, info};

use crate::error_handling::types::IngestError;
use crate::ingestion::types::{RawIngest, RawSession, RawSessions};
use crate::storage::storage_trait::Storage;
use crate::storage::types::SessionRecord;

/// Layout of the joined `date time` pair.
pub const SAMPLE_TIME_FORMAT: &str = "%m/%d/%y %H:%M:%S";

fn parse_sample_time(host: &str, date: &str, time: &str) -> Result<NaiveDateTime, IngestError> {
    NaiveDateTime::parse_from_str(&format!("{} {}", date, time), SAMPLE_TIME_FORMAT).map_err(|e| {
        IngestError::Parse {
            host: host.to_string(),
            date: date.to_string(),
            time: time.to_string(),
            reason: e.to_string(),
        }
    })
}

// Numeric indices in numeric order ("2" before "10"), anything else after.
fn ordered_sessions(sessions: &RawSessions) -> Vec<&RawSession> {
    let mut entries: Vec<(&String, &RawSession)> = sessions.iter().collect();
    entries.sort_by_key(|(idx, _)| (idx.parse::<u64>().unwrap_or(u64::MAX), (*idx).clone()));
    entries.into_iter().map(|(_, s)| s).collect()
}

/// Flatten nested ingestion input into one record per leaf session.
///
/// Fails on the first unparseable date/time pair; no partial output is
/// returned. Duplicates are kept.
pub fn normalize(input: &RawIngest) -> Result<Vec<SessionRecord>, IngestError> {
    let mut records = Vec::new();
    for (host, dates) in input {
        for (date, times) in dates {
            for (time, sessions) in times {
                let at = parse_sample_time(host, date, time)?;
                for session in ordered_sessions(sessions) {
                    records.push(SessionRecord {
                        host: host.clone(),
                        time: at,
                        user: session.user.clone(),
                        program: session.prog.clone(),
                        cpu: session.jcpu.clone(),
                        tty: session.tty.clone(),
                        from: session.from.clone(),
                        login: session.login.clone(),
                        idle: session.idle.clone(),
                    });
                }
            }
        }
    }
    debug!("Normalized {} host(s) into {} record(s)", input.len(), records.len());
    Ok(records)
}

/// Normalize `input` and store the result as one batch.
pub fn ingest(storage: &dyn Storage, input: &RawIngest) -> Result<usize, IngestError> {
    let records = normalize(input)?;
    let stored = storage.insert_records(&records)?;
    info!("Ingested {} session record(s)", stored);
    Ok(stored)
}

/// Read a JSON ingestion document from `path` and ingest it.
pub fn ingest_file<P: AsRef<Path>>(storage: &dyn Storage, path: P) -> Result<usize, IngestError> {
    let path = path.as_ref();
    info!("Reading ingestion input from {}", path.display());
    let content = fs::read_to_string(path)?;
    let input: RawIngest = serde_json::from_str(&content)?;
    ingest(storage, &input)
}
