use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CopilotError;

/// Closed set of alarm states the data source may report. Anything else in
/// the input is a parse error, not a silently-invented state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlarmState {
    Ok,
    Low,
    High,
    HighHigh,
}

impl AlarmState {
    /// States that indicate an active alarm rather than normal operation.
    pub fn is_alarm(self) -> bool {
        !matches!(self, AlarmState::Ok)
    }
}

impl FromStr for AlarmState {
    type Err = CopilotError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ok" | "normal" => Ok(AlarmState::Ok),
            "low" => Ok(AlarmState::Low),
            "high" => Ok(AlarmState::High),
            "highhigh" => Ok(AlarmState::HighHigh),
            other => Err(CopilotError::InvalidInput(format!(
                "unknown alarm state '{other}'"
            ))),
        }
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlarmState::Ok => "OK",
            AlarmState::Low => "Low",
            AlarmState::High => "High",
            AlarmState::HighHigh => "HighHigh",
        };
        f.write_str(name)
    }
}

/// One process measurement with its alarm state. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub timestamp: DateTime<Utc>,
    pub tag: String,
    pub value: f64,
    pub alarm_state: AlarmState,
}

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CopilotError> {
        if end <= start {
            return Err(CopilotError::InvalidInput(format!(
                "window end {end} is not after start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse ISO-8601 bounds. Offset-less timestamps are taken as UTC, which
    /// is how the data source records them.
    pub fn parse(start: &str, end: &str) -> Result<Self, CopilotError> {
        Self::new(parse_timestamp(start)?, parse_timestamp(end)?)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// End bound is exclusive.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    pub fn duration_hours(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 3_600_000.0
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CopilotError> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(CopilotError::InvalidInput(format!(
        "unparseable timestamp '{raw}'"
    )))
}

/// Source of alarm records. Read fresh on every request; nothing in the
/// pipeline caches records across calls.
#[async_trait]
pub trait AlarmSource: Send + Sync {
    async fn load(&self) -> Result<Vec<AlarmRecord>, CopilotError>;
}

/// Tabular file source: a header line, then
/// `timestamp,tag,value,alarm_state` rows. Records come back sorted by
/// timestamp then tag so downstream transition analysis sees a stable order.
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AlarmSource for CsvFileSource {
    async fn load(&self) -> Result<Vec<AlarmRecord>, CopilotError> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let mut records = parse_records(&contents)?;
        records.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.tag.cmp(&b.tag))
        });
        tracing::debug!(
            records = records.len(),
            path = %self.path.display(),
            "alarm data loaded"
        );
        Ok(records)
    }
}

pub(crate) fn parse_records(contents: &str) -> Result<Vec<AlarmRecord>, CopilotError> {
    let mut records = Vec::new();

    // Line 1 is the header; humans number the first data line 2.
    for (line_idx, line) in contents.lines().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line_no = line_idx + 1;

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 4 {
            return Err(CopilotError::InvalidInput(format!(
                "line {line_no}: expected 4 columns, found {}",
                fields.len()
            )));
        }

        let timestamp = parse_timestamp(fields[0]).map_err(|_| {
            CopilotError::InvalidInput(format!(
                "line {line_no}: unparseable timestamp '{}'",
                fields[0].trim()
            ))
        })?;
        let value: f64 = fields[2].trim().parse().map_err(|_| {
            CopilotError::InvalidInput(format!("line {line_no}: bad value '{}'", fields[2].trim()))
        })?;
        let alarm_state = AlarmState::from_str(fields[3]).map_err(|_| {
            CopilotError::InvalidInput(format!(
                "line {line_no}: unknown alarm state '{}'",
                fields[3].trim()
            ))
        })?;

        records.push(AlarmRecord {
            timestamp,
            tag: fields[1].trim().to_string(),
            value,
            alarm_state,
        });
    }

    Ok(records)
}
