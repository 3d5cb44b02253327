use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// What a chart plots.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    /// Time series, one point per bucket.
    Line(Vec<(NaiveDateTime, u64)>),
    /// Labelled totals.
    Bar(Vec<(String, u64)>),
}

impl ChartData {
    pub fn is_empty(&self) -> bool {
        match self {
            ChartData::Line(points) => points.is_empty(),
            ChartData::Bar(bars) => bars.is_empty(),
        }
    }
}

/// Everything a renderer needs to draw one artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub data: ChartData,
}

/// What to do when one report target fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure and continue with the next target.
    #[default]
    Skip,
    /// Stop the run at the first failure.
    Abort,
}

/// Outcome of a full report run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSummary {
    pub written: Vec<PathBuf>,
    /// Target name and the reason it was skipped.
    pub skipped: Vec<(String, String)>,
}

fn separator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[/\\:\s]+").expect("separator pattern is valid"))
}

/// Filename stem for a target: `prefix-name`, with path separators and
/// whitespace in `name` replaced by `_`.
pub fn output_key(prefix: &str, name: &str) -> String {
    format!("{}-{}", prefix, separator_pattern().replace_all(name, "_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_key_sanitizes_separators() {
        assert_eq!(output_key("host", "unix1.andrew.cmu.edu"), "host-unix1.andrew.cmu.edu");
        assert_eq!(output_key("host", "a/b\\c:d"), "host-a_b_c_d");
        assert_eq!(output_key("program", "/usr/bin/vim"), "program-_usr_bin_vim");
        assert_eq!(output_key("program", "my  shell"), "program-my_shell");
    }
}
