//! In-memory JUnit report tree produced by the decoder.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Label used when neither the report nor its only suite carries a name.
pub const DEFAULT_BUILD_LABEL: &str = "JUnit Import";

/// A decoded JUnit document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    /// `name` of the `<testsuites>` root, or of a bare `<testsuite>` root.
    pub name: Option<String>,
    /// Suites in document order; nested suites are flattened.
    pub suites: Vec<Suite>,
}

/// One `<testsuite>` element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Suite {
    pub name: String,
    pub hostname: String,
    pub timestamp: Option<String>,
    /// Cumulative time in seconds
    pub time: f64,
    pub tests: u32,
    pub failures: u32,
    pub errors: u32,
    pub skipped: u32,
    pub cases: Vec<Case>,
}

/// One `<testcase>` element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Case {
    pub name: String,
    pub classname: String,
    /// Execution time in seconds
    pub time: f64,
    pub failure: Option<Fault>,
    pub error: Option<Fault>,
    pub skipped: Option<Skip>,
}

/// Content of a `<failure>` or `<error>` child.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fault {
    pub message: Option<String>,
    /// The `type` attribute
    pub kind: Option<String>,
    /// Trimmed text content, CDATA included
    pub details: Option<String>,
}

/// Content of a `<skipped>` child.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skip {
    pub message: Option<String>,
}

impl Report {
    /// Label for the build created from this report.
    ///
    /// Report name first, then the name of a single suite, then
    /// [`DEFAULT_BUILD_LABEL`].
    pub fn build_label(&self) -> &str {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name;
        }
        if let [only] = self.suites.as_slice()
            && !only.name.is_empty()
        {
            return &only.name;
        }
        DEFAULT_BUILD_LABEL
    }

    /// Total number of `<testcase>` elements across all suites.
    pub fn case_count(&self) -> usize {
        self.suites.iter().map(|s| s.cases.len()).sum()
    }

    /// Sum of the suites' cumulative times.
    pub fn total_time(&self) -> f64 {
        self.suites.iter().map(|s| s.time).sum()
    }

    /// Earliest parseable suite timestamp.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.suites
            .iter()
            .filter_map(|s| s.timestamp.as_deref())
            .filter_map(parse_timestamp)
            .min()
    }
}

/// Parse a suite timestamp.
///
/// Accepts RFC 3339 and the offset-less ISO-8601 form most runners emit,
/// which is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
