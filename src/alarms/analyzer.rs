use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::CopilotError;

use super::records::{AlarmRecord, AlarmSource, AlarmState, TimeWindow};

/// Slope dead band: flatter than this (in value units per sample) counts as
/// stable.
const TREND_DEAD_BAND: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
        };
        f.write_str(name)
    }
}

/// One alarm-state change observed inside the window, in time order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateTransition {
    pub timestamp: DateTime<Utc>,
    pub from: AlarmState,
    pub to: AlarmState,
    pub value: f64,
}

/// Quantitative summary of one tag over one window. Purely numeric; the
/// analyzer never reads documents.
#[derive(Debug, Clone, Serialize)]
pub struct DataSummary {
    pub tag: String,
    pub count: usize,
    pub window_hours: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub mean_value: f64,
    pub std_value: f64,
    pub trend_slope: f64,
    pub trend: TrendDirection,
    pub state_counts: BTreeMap<AlarmState, usize>,
    pub transitions: Vec<StateTransition>,
}

impl DataSummary {
    /// Transitions that land in an alarm state, the ones operators act on.
    pub fn critical_transitions(&self) -> usize {
        self.transitions.iter().filter(|t| t.to.is_alarm()).count()
    }

    /// Human-readable rendering used for the `summary_from_data` field.
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("Process tag {} analysis:", self.tag),
            format!(
                "- Data points: {} over {:.1} hours",
                self.count, self.window_hours
            ),
            format!(
                "- Value range: {:.2} to {:.2} (mean: {:.2}, std: {:.2})",
                self.min_value, self.max_value, self.mean_value, self.std_value
            ),
            format!("- Trend: {} (slope: {:.3})", self.trend, self.trend_slope),
        ];

        let states = self
            .state_counts
            .iter()
            .map(|(state, count)| format!("{state}: {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("- Alarm states: {states}"));

        if !self.transitions.is_empty() {
            lines.push(format!(
                "- Alarm transitions: {} state changes",
                self.transitions.len()
            ));
            let critical = self.critical_transitions();
            if critical > 0 {
                lines.push(format!("- Critical: {critical} transitions into alarm states"));
            }
        }

        lines.join("\n")
    }
}

/// Filters a record source by tag and window and reduces the result to a
/// `DataSummary`. An empty filter result is an explicit `NoDataInWindow`
/// failure, never zero-filled statistics.
pub struct AlarmAnalyzer;

impl AlarmAnalyzer {
    pub async fn analyze(
        &self,
        source: &dyn AlarmSource,
        tag: &str,
        window: TimeWindow,
    ) -> Result<DataSummary, CopilotError> {
        let records = source.load().await?;
        let selected: Vec<&AlarmRecord> = records
            .iter()
            .filter(|record| record.tag == tag && window.contains(record.timestamp))
            .collect();

        if selected.is_empty() {
            return Err(CopilotError::NoDataInWindow {
                tag: tag.to_string(),
            });
        }

        let values: Vec<f64> = selected.iter().map(|record| record.value).collect();
        let count = values.len();
        let min_value = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max_value = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean_value = values.iter().sum::<f64>() / count as f64;
        let variance =
            values.iter().map(|v| (v - mean_value).powi(2)).sum::<f64>() / count as f64;
        let std_value = variance.sqrt();

        let trend_slope = least_squares_slope(&values);
        let trend = if trend_slope > TREND_DEAD_BAND {
            TrendDirection::Increasing
        } else if trend_slope < -TREND_DEAD_BAND {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };

        let mut state_counts = BTreeMap::new();
        for record in &selected {
            *state_counts.entry(record.alarm_state).or_insert(0) += 1;
        }

        let transitions = find_transitions(&selected);

        tracing::info!(%tag, count, %trend, transitions = transitions.len(), "window analyzed");

        Ok(DataSummary {
            tag: tag.to_string(),
            count,
            window_hours: window.duration_hours(),
            min_value,
            max_value,
            mean_value,
            std_value,
            trend_slope,
            trend,
            state_counts,
            transitions,
        })
    }
}

/// Least-squares slope of value over sample index. Fewer than two samples
/// have no trend.
fn least_squares_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let mean_x = (n as f64 - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n as f64;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, value) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        numerator += dx * (value - mean_y);
        denominator += dx * dx;
    }

    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn find_transitions(records: &[&AlarmRecord]) -> Vec<StateTransition> {
    let mut transitions = Vec::new();
    for pair in records.windows(2) {
        let (previous, current) = (pair[0], pair[1]);
        if previous.alarm_state != current.alarm_state {
            transitions.push(StateTransition {
                timestamp: current.timestamp,
                from: previous.alarm_state,
                to: current.alarm_state,
                value: current.value,
            });
        }
    }
    transitions
}
