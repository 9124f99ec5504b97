//! Time-of-day activity analysis.
//!
//! Buckets detection timestamps by hour of day (date ignored) and reports every
//! hour sharing the maximum count. Recomputed on each query; history keeps
//! growing between calls so nothing is memoised.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;

pub const NO_DETECTIONS: &str = "No detections recorded.";
pub const NO_OVERALL_PATTERN: &str =
    "No overall pattern available yet. Continue detection to gather data.";

/// Hours (0-23) sharing the highest detection count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeakActivity {
    pub hours: Vec<u32>,
    pub count: usize,
}

impl PeakActivity {
    /// `"H:00-(H+1):00"` ranges in ascending hour order, comma separated.
    pub fn ranges(&self) -> String {
        self.hours
            .iter()
            .map(|h| format!("{}:00-{}:00", h, h + 1))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn describe(&self) -> String {
        format!("Most active during: {} (with {} detections)", self.ranges(), self.count)
    }

    pub fn describe_overall(&self) -> String {
        format!(
            "Overall most active during: {} (with {} total detections)",
            self.ranges(),
            self.count
        )
    }
}

pub fn hourly_counts(timestamps: &[NaiveDateTime]) -> [usize; 24] {
    let mut counts = [0usize; 24];
    for ts in timestamps {
        counts[ts.hour() as usize] += 1;
    }
    counts
}

/// Peak hours of a timestamp series, tie-inclusive. `None` when empty.
pub fn peak_activity(timestamps: &[NaiveDateTime]) -> Option<PeakActivity> {
    let counts = hourly_counts(timestamps);
    let max = counts.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return None;
    }
    let hours = (0u32..24).filter(|h| counts[*h as usize] == max).collect();
    Some(PeakActivity { hours, count: max })
}

/// Per-class and overall peak-activity messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternReport {
    pub animal_patterns: BTreeMap<String, String>,
    pub overall_pattern: String,
}

impl PatternReport {
    pub fn build(history: &BTreeMap<String, Vec<NaiveDateTime>>, timeline: &[NaiveDateTime]) -> Self {
        let animal_patterns = history
            .iter()
            .map(|(name, stamps)| {
                let message = peak_activity(stamps)
                    .map(|peak| peak.describe())
                    .unwrap_or_else(|| NO_DETECTIONS.to_string());
                (name.clone(), message)
            })
            .collect();

        let overall_pattern = peak_activity(timeline)
            .map(|peak| peak.describe_overall())
            .unwrap_or_else(|| NO_OVERALL_PATTERN.to_string());

        Self { animal_patterns, overall_pattern }
    }
}
