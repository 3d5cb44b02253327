//! Predicate composition for session queries.
//!
//! A `Filter` is the conjunction of at most one constraint per predicate
//! kind. Each `Predicate` expands into a single-key fragment; fragments are
//! merged by key union, a later fragment replacing an earlier one of the
//! same kind.

use chrono::{Duration, NaiveDateTime};
use log::warn;
use serde::Serialize;

use crate::error_handling::types::FilterError;
use crate::storage::types::{SessionRecord, DISPLAY_TIME_FORMAT};

/// Half-width of the window matched by a `time` predicate. Not configurable.
pub const TIME_TOLERANCE_SECS: i64 = 5;

/// Accepted textual timestamp layouts for raw `time` predicate values.
const RAW_TIME_FORMATS: [&str; 3] = [DISPLAY_TIME_FORMAT, "%Y-%m-%d %H:%M:%S", "%m/%d/%y %H:%M:%S"];

/// The closed set of recognised predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Matches hosts equal to, or starting with, the given text.
    Host(String),
    /// Matches records within `TIME_TOLERANCE_SECS` of an instant.
    Time(TimeWindow),
    User(String),
    Program(String),
}

impl Predicate {
    pub fn name(&self) -> &'static str {
        match self {
            Predicate::Host(_) => "host",
            Predicate::Time(_) => "time",
            Predicate::User(_) => "user",
            Predicate::Program(_) => "program",
        }
    }

    /// Build a predicate from its name and a raw textual value.
    pub fn parse(name: &str, raw: &str) -> Result<Self, FilterError> {
        match name {
            "host" => Ok(Predicate::Host(raw.to_string())),
            "user" => Ok(Predicate::User(raw.to_string())),
            "program" => Ok(Predicate::Program(raw.to_string())),
            "time" => parse_time(raw)
                .and_then(TimeWindow::around)
                .map(Predicate::Time)
                .ok_or_else(|| FilterError::InvalidValue {
                    predicate: name.to_string(),
                    value: raw.to_string(),
                }),
            other => Err(FilterError::UnsupportedPredicate(other.to_string())),
        }
    }

    fn fragment(self) -> Filter {
        match self {
            Predicate::Host(prefix) => Filter {
                host: Some(prefix),
                ..Default::default()
            },
            Predicate::Time(window) => Filter {
                time: Some(window),
                ..Default::default()
            },
            Predicate::User(user) => Filter {
                user: Some(user),
                ..Default::default()
            },
            Predicate::Program(program) => Filter {
                program: Some(program),
                ..Default::default()
            },
        }
    }
}

fn parse_time(raw: &str) -> Option<NaiveDateTime> {
    RAW_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw.trim(), fmt).ok())
}

/// Inclusive time range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    /// `None` when either bound falls outside the representable range.
    pub fn around(center: NaiveDateTime) -> Option<Self> {
        let tolerance = Duration::seconds(TIME_TOLERANCE_SECS);
        Some(Self {
            start: center.checked_sub_signed(tolerance)?,
            end: center.checked_add_signed(tolerance)?,
        })
    }

    pub fn contains(&self, time: NaiveDateTime) -> bool {
        self.start <= time && time <= self.end
    }
}

/// Conjunctive filter over session records. Absent constraints match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Filter {
    pub host: Option<String>,
    pub time: Option<TimeWindow>,
    pub user: Option<String>,
    pub program: Option<String>,
}

impl Filter {
    /// The empty filter, matching every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.host.is_none() && self.time.is_none() && self.user.is_none() && self.program.is_none()
    }

    /// Key-union merge; keys present in `other` replace ours.
    pub fn merge(mut self, other: Filter) -> Self {
        if other.host.is_some() {
            if self.host.is_some() {
                warn!("Predicate 'host' given twice, keeping the later value");
            }
            self.host = other.host;
        }
        if other.time.is_some() {
            if self.time.is_some() {
                warn!("Predicate 'time' given twice, keeping the later value");
            }
            self.time = other.time;
        }
        if other.user.is_some() {
            if self.user.is_some() {
                warn!("Predicate 'user' given twice, keeping the later value");
            }
            self.user = other.user;
        }
        if other.program.is_some() {
            if self.program.is_some() {
                warn!("Predicate 'program' given twice, keeping the later value");
            }
            self.program = other.program;
        }
        self
    }

    pub fn with(self, predicate: Predicate) -> Self {
        self.merge(predicate.fragment())
    }

    pub fn matches(&self, record: &SessionRecord) -> bool {
        if let Some(ref prefix) = self.host {
            if !record.host.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(window) = self.time {
            if !window.contains(record.time) {
                return false;
            }
        }
        if let Some(ref user) = self.user {
            if &record.user != user {
                return false;
            }
        }
        if let Some(ref program) = self.program {
            if &record.program != program {
                return false;
            }
        }
        true
    }
}

/// Compose typed predicates, in iteration order, into one filter.
pub fn compose<I>(predicates: I) -> Filter
where
    I: IntoIterator<Item = Predicate>,
{
    predicates.into_iter().fold(Filter::all(), Filter::with)
}

/// Compose a filter from `(name, raw value)` pairs.
///
/// Fails on the first name outside the recognised predicate set.
pub fn compose_raw<'a, I>(pairs: I) -> Result<Filter, FilterError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let predicates = pairs
        .into_iter()
        .map(|(name, raw)| Predicate::parse(name, raw))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(compose(predicates))
}

/// Build a `Filter` that matches hosts by exact name or prefix.
pub fn by_host<S: Into<String>>(prefix: S) -> Filter {
    Predicate::Host(prefix.into()).fragment()
}

/// Build a `Filter` that matches records sampled around `time`.
pub fn at_time(time: NaiveDateTime) -> Result<Filter, FilterError> {
    TimeWindow::around(time)
        .map(|window| Predicate::Time(window).fragment())
        .ok_or_else(|| FilterError::InvalidValue {
            predicate: "time".to_string(),
            value: time.format(DISPLAY_TIME_FORMAT).to_string(),
        })
}

pub fn by_program<S: Into<String>>(program: S) -> Filter {
    Predicate::Program(program.into()).fragment()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn record(host: &str, user: &str, time: NaiveDateTime) -> SessionRecord {
        SessionRecord {
            host: host.into(),
            time,
            user: user.into(),
            program: "bash".into(),
            cpu: "0".into(),
            tty: "pts/0".into(),
            from: "-".into(),
            login: "10:00".into(),
            idle: "0".into(),
        }
    }

    #[test]
    fn test_conjunction() {
        let filter = compose(vec![Predicate::Host("h".into()), Predicate::User("u".into())]);
        assert!(filter.matches(&record("h", "u", t(10, 0, 0))));
        assert!(!filter.matches(&record("h", "v", t(10, 0, 0))));
        assert!(!filter.matches(&record("x", "u", t(10, 0, 0))));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = compose(Vec::new());
        assert!(filter.is_empty());
        assert!(filter.matches(&record("any", "one", t(0, 0, 0))));
    }

    #[test]
    fn test_time_tolerance() {
        let filter = at_time(t(10, 0, 0)).unwrap();
        assert!(filter.matches(&record("h", "u", t(10, 0, 4))));
        assert!(filter.matches(&record("h", "u", t(9, 59, 56))));
        assert!(filter.matches(&record("h", "u", t(10, 0, 5))));
        assert!(!filter.matches(&record("h", "u", t(10, 0, 6))));
    }

    #[test]
    fn test_host_prefix() {
        let filter = by_host("unix");
        assert!(filter.matches(&record("unix", "u", t(10, 0, 0))));
        assert!(filter.matches(&record("unix3.andrew.cmu.edu", "u", t(10, 0, 0))));
        assert!(!filter.matches(&record("linux.andrew", "u", t(10, 0, 0))));
    }

    #[test]
    fn test_later_fragment_wins() {
        let filter = compose(vec![
            Predicate::User("first".into()),
            Predicate::User("second".into()),
        ]);
        assert_eq!(filter.user.as_deref(), Some("second"));
    }

    #[test]
    fn test_compose_raw() {
        let filter = compose_raw(vec![("host", "unix.andrew"), ("time", "01/02/20 10:00:00")])
            .unwrap();
        assert_eq!(filter.host.as_deref(), Some("unix.andrew"));
        assert_eq!(filter.time, TimeWindow::around(t(10, 0, 0)));

        let iso = compose_raw(vec![("time", "2020-01-02T10:00:00")]).unwrap();
        assert_eq!(iso.time, filter.time);
    }

    #[test]
    fn test_compose_raw_rejects_unknown_predicate() {
        let err = compose_raw(vec![("host", "h"), ("tty", "pts/1")]).unwrap_err();
        assert_eq!(err, FilterError::UnsupportedPredicate("tty".into()));
    }

    #[test]
    fn test_compose_raw_rejects_bad_time() {
        let err = compose_raw(vec![("time", "yesterday")]).unwrap_err();
        assert!(matches!(err, FilterError::InvalidValue { .. }));
    }

    #[test]
    fn test_time_at_range_edges_is_rejected() {
        for raw in ["+262142-12-31T23:59:59", "-262143-01-01T00:00:00"] {
            let err = compose_raw(vec![("time", raw)]).unwrap_err();
            assert_eq!(
                err,
                FilterError::InvalidValue {
                    predicate: "time".into(),
                    value: raw.into(),
                }
            );
        }
        assert!(TimeWindow::around(NaiveDateTime::MAX).is_none());
        assert!(at_time(NaiveDateTime::MIN).is_err());
    }
}
