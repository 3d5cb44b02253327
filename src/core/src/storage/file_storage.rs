use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error_handling::types::StorageError;
use crate::storage::session_filter::Filter;
use crate::storage::storage_trait::Storage;
use crate::storage::types::{Field, FieldValue, SessionRecord};

const RECORDS_FILE: &str = "records.jsonl";

// One line of the records file. The id never leaves this module.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    id: Uuid,
    #[serde(flatten)]
    record: SessionRecord,
}

/// Session records kept as JSON lines in a single file.
///
/// Every query scans the whole file and filters in process.
pub struct FileStorage {
    base_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| {
            error!("Failed to create storage dir {}: {}", base_path.display(), e);
            StorageError::WriteFailed(e.to_string())
        })?;
        info!("FileStorage initialized at {}", base_path.display());
        Ok(Self {
            base_path,
            write_lock: Mutex::new(()),
        })
    }

    fn records_path(&self) -> PathBuf {
        self.base_path.join(RECORDS_FILE)
    }

    fn load_records(&self) -> Result<Vec<SessionRecord>, StorageError> {
        let path = self.records_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&path).map_err(|e| {
            error!("Failed to open records file {}: {}", path.display(), e);
            StorageError::ReadFailed(e.to_string())
        })?;
        let mut records = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                error!("Read failed {}: {}", path.display(), e);
                StorageError::ReadFailed(e.to_string())
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let stored: StoredRecord = serde_json::from_str(&line).map_err(|e| {
                error!("Corrupt record at {}:{}: {}", path.display(), lineno + 1, e);
                StorageError::ReadFailed(format!("line {}: {}", lineno + 1, e))
            })?;
            records.push(stored.record);
        }
        Ok(records)
    }

    fn select(
        &self,
        filter: &Filter,
        sort: Option<Field>,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        let mut records = self.load_records()?;
        let original_len = records.len();
        records.retain(|r| filter.matches(r));
        if let Some(field) = sort {
            records.sort_by_key(|r| r.field(field));
        }
        debug!("Loaded {} record(s), {} after filter {:?}", original_len, records.len(), filter);
        Ok(records)
    }
}

impl Storage for FileStorage {
    fn insert_records(&self, records: &[SessionRecord]) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }
        // Serialize the whole batch up front so a failure leaves the file untouched.
        let mut buf = String::new();
        for record in records {
            let line = serde_json::to_string(&StoredRecord {
                id: Uuid::new_v4(),
                record: record.clone(),
            })
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
            buf.push_str(&line);
            buf.push('\n');
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::WriteFailed("write lock poisoned".into()))?;
        let path = self.records_path();
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                error!("Open append failed {}: {}", path.display(), e);
                StorageError::WriteFailed(e.to_string())
            })?;
        f.write_all(buf.as_bytes()).map_err(|e| {
            error!("Write failed {}: {}", path.display(), e);
            StorageError::WriteFailed(e.to_string())
        })?;
        info!("Appended {} record(s) to {}", records.len(), path.display());
        Ok(records.len())
    }

    fn find(
        &self,
        filter: &Filter,
        sort: Option<Field>,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        self.select(filter, sort)
    }

    fn find_field(
        &self,
        filter: &Filter,
        field: Field,
        sort: Option<Field>,
    ) -> Result<Vec<FieldValue>, StorageError> {
        Ok(self
            .select(filter, sort)?
            .iter()
            .map(|r| r.field(field))
            .collect())
    }

    fn count(&self, filter: &Filter) -> Result<u64, StorageError> {
        Ok(self.select(filter, None)?.len() as u64)
    }

    fn distinct(&self, field: Field) -> Result<Vec<FieldValue>, StorageError> {
        let values: BTreeSet<FieldValue> =
            self.load_records()?.iter().map(|r| r.field(field)).collect();
        debug!("{} distinct value(s) for {}", values.len(), field);
        Ok(values.into_iter().collect())
    }
}
