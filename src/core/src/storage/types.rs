use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error_handling::types::FilterError;

/// Format used when a timestamp is rendered for humans or parsed from queries.
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One observed login session, as produced by a single `last`-style sample.
///
/// `cpu`, `tty`, `from`, `login` and `idle` are carried verbatim and never
/// interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub host: String,
    pub time: NaiveDateTime,
    pub user: String,
    pub program: String,
    pub cpu: String,
    pub tty: String,
    pub from: String,
    pub login: String,
    pub idle: String,
}

impl SessionRecord {
    pub fn field(&self, field: Field) -> FieldValue {
        match field {
            Field::Host => FieldValue::Text(self.host.clone()),
            Field::Time => FieldValue::Time(self.time),
            Field::User => FieldValue::Text(self.user.clone()),
            Field::Program => FieldValue::Text(self.program.clone()),
            Field::Cpu => FieldValue::Text(self.cpu.clone()),
            Field::Tty => FieldValue::Text(self.tty.clone()),
            Field::From => FieldValue::Text(self.from.clone()),
            Field::Login => FieldValue::Text(self.login.clone()),
            Field::Idle => FieldValue::Text(self.idle.clone()),
        }
    }
}

/// Named record attributes usable for projection, sorting and `distinct`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Host,
    Time,
    User,
    Program,
    Cpu,
    Tty,
    From,
    Login,
    Idle,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Host => "host",
            Field::Time => "time",
            Field::User => "user",
            Field::Program => "program",
            Field::Cpu => "cpu",
            Field::Tty => "tty",
            Field::From => "from",
            Field::Login => "login",
            Field::Idle => "idle",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(Field::Host),
            "time" => Ok(Field::Time),
            "user" => Ok(Field::User),
            "program" => Ok(Field::Program),
            "cpu" => Ok(Field::Cpu),
            "tty" => Ok(Field::Tty),
            "from" => Ok(Field::From),
            "login" => Ok(Field::Login),
            "idle" => Ok(Field::Idle),
            other => Err(FilterError::UnsupportedField(other.to_string())),
        }
    }
}

/// A single projected value. Ordering puts every `Text` before every `Time`,
/// which never matters in practice since a projection holds one field only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Time(NaiveDateTime),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Time(_) => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::Time(t) => Some(*t),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Time(t) => write!(f, "{}", t.format(DISPLAY_TIME_FORMAT)),
        }
    }
}

/// Seconds since the epoch, treating the naive timestamp as UTC.
pub fn to_epoch_seconds(time: NaiveDateTime) -> i64 {
    time.and_utc().timestamp()
}

pub fn from_epoch_seconds(secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}
