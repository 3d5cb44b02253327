use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One leaf entry of the ingestion input, as emitted by the sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSession {
    pub user: String,
    pub prog: String,
    /// Renamed to `cpu` once normalized
    pub jcpu: String,
    pub tty: String,
    pub from: String,
    pub login: String,
    pub idle: String,
}

/// Session index (`"0"`, `"1"`, ...) to session fields.
pub type RawSessions = BTreeMap<String, RawSession>;

/// `host -> MM/DD/YY -> HH:MM:SS -> index -> session`.
pub type RawIngest = BTreeMap<String, BTreeMap<String, BTreeMap<String, RawSessions>>>;
