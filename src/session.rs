/// Process-wide session state.
///
/// One `SessionState` lives for the whole server process and is shared by the
/// capture task and every request handler. All fields sit behind a single
/// mutex, so each public method is one atomic logical operation.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::filter::ActiveFilter;
use crate::pattern::PatternReport;

pub const DEFAULT_CUE: &str = "drum.mp3";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Per-class detection timestamps, in detection order.
pub type AnimalHistory = BTreeMap<String, Vec<NaiveDateTime>>;

/// Result of the read-and-clear status poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionStatus {
    pub detected: bool,
    pub latest_detection: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct SessionData {
    pub(crate) active: bool,
    pub(crate) filter: ActiveFilter,
    pub(crate) cue: String,
    pub(crate) history: AnimalHistory,
    pub(crate) timeline: Vec<NaiveDateTime>,
    pub(crate) latest: BTreeSet<String>,
    pub(crate) detected: bool,
}

impl SessionData {
    fn clear_detections(&mut self) {
        self.history.clear();
        self.timeline.clear();
        self.latest.clear();
        self.detected = false;
    }
}

pub struct SessionState {
    inner: Mutex<SessionData>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(ActiveFilter::All, DEFAULT_CUE)
    }
}

impl SessionState {
    /// Fresh, inactive session with empty collections.
    pub fn new(filter: ActiveFilter, cue: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(SessionData {
                active: false,
                filter,
                cue: cue.into(),
                history: AnimalHistory::new(),
                timeline: Vec::new(),
                latest: BTreeSet::new(),
                detected: false,
            }),
        }
    }

    /// Run `f` with exclusive access to the whole state.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut SessionData) -> R) -> R {
        let mut data = self.inner.lock();
        f(&mut data)
    }

    pub fn filter(&self) -> ActiveFilter {
        self.inner.lock().filter.clone()
    }

    pub fn set_filter(&self, filter: ActiveFilter) {
        info!("Selected animal for detection: {}", filter);
        self.inner.lock().filter = filter;
    }

    pub fn cue(&self) -> String {
        self.inner.lock().cue.clone()
    }

    pub fn set_cue(&self, cue: impl Into<String>) {
        let cue = cue.into();
        info!("Selected sound file: {}", cue);
        self.inner.lock().cue = cue;
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }

    /// Mark the session streaming. Fails if a stream is already active.
    pub fn activate(&self) -> Result<()> {
        let mut data = self.inner.lock();
        if data.active {
            return Err(PipelineError::AlreadyStreaming);
        }
        data.active = true;
        Ok(())
    }

    /// Mark the session inactive. With `clear`, history, timeline, latest
    /// detections and the detected flag are reset; filter and cue survive.
    pub fn deactivate(&self, clear: bool) {
        let mut data = self.inner.lock();
        data.active = false;
        if clear {
            data.clear_detections();
        }
    }

    /// Atomically return and reset the detected flag and latest detections.
    pub fn take_detection_status(&self) -> DetectionStatus {
        let mut data = self.inner.lock();
        let latest = std::mem::take(&mut data.latest);
        let detected = std::mem::replace(&mut data.detected, false);
        DetectionStatus {
            detected,
            latest_detection: latest.into_iter().collect(),
        }
    }

    pub fn history_snapshot(&self) -> AnimalHistory {
        self.inner.lock().history.clone()
    }

    /// History with timestamps rendered as `YYYY-MM-DD HH:MM:SS`.
    pub fn formatted_history(&self) -> BTreeMap<String, Vec<String>> {
        self.history_snapshot()
            .into_iter()
            .map(|(name, stamps)| {
                let formatted = stamps
                    .iter()
                    .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
                    .collect();
                (name, formatted)
            })
            .collect()
    }

    pub fn timeline_snapshot(&self) -> Vec<NaiveDateTime> {
        self.inner.lock().timeline.clone()
    }

    /// Peak-activity report over a consistent snapshot of history and timeline.
    pub fn pattern_report(&self) -> PatternReport {
        let (history, timeline) = {
            let data = self.inner.lock();
            (data.history.clone(), data.timeline.clone())
        };
        PatternReport::build(&history, &timeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap()
    }

    fn seed(state: &SessionState) {
        state.update(|data| {
            data.history.insert("lion".into(), vec![at(6, 0)]);
            data.timeline.push(at(6, 0));
            data.latest.insert("lion".into());
            data.detected = true;
        });
    }

    #[test]
    fn test_take_detection_status_clears() {
        let state = SessionState::default();
        seed(&state);

        let first = state.take_detection_status();
        assert!(first.detected);
        assert_eq!(first.latest_detection, vec!["lion".to_string()]);

        let second = state.take_detection_status();
        assert_eq!(second, DetectionStatus { detected: false, latest_detection: vec![] });
    }

    #[test]
    fn test_deactivate_clears_but_keeps_selection() {
        let state = SessionState::default();
        state.set_filter(ActiveFilter::Class("lion".into()));
        state.set_cue("bell.mp3");
        state.activate().unwrap();
        seed(&state);

        state.deactivate(true);

        assert!(!state.is_active());
        assert!(state.history_snapshot().is_empty());
        assert!(state.timeline_snapshot().is_empty());
        assert!(!state.take_detection_status().detected);
        assert_eq!(state.filter(), ActiveFilter::Class("lion".into()));
        assert_eq!(state.cue(), "bell.mp3");
    }

    #[test]
    fn test_deactivate_without_clear_keeps_history() {
        let state = SessionState::default();
        state.activate().unwrap();
        seed(&state);

        state.deactivate(false);

        assert!(!state.is_active());
        assert_eq!(state.timeline_snapshot().len(), 1);
    }

    #[test]
    fn test_activate_twice_fails() {
        let state = SessionState::default();
        state.activate().unwrap();
        assert!(matches!(state.activate(), Err(PipelineError::AlreadyStreaming)));
    }

    #[test]
    fn test_formatted_history() {
        let state = SessionState::default();
        seed(&state);
        let formatted = state.formatted_history();
        assert_eq!(formatted["lion"], vec!["2024-03-01 06:00:00".to_string()]);
    }

    #[test]
    fn test_concurrent_poll_sees_whole_frames() {
        use crate::aggregator::DetectionAggregator;
        use crate::engine::Detection;
        use std::sync::Arc;

        let det = |class_id| Detection { class_id, confidence: 0.7, bbox_norm: (0.0, 0.0, 0.5, 0.5) };
        let frames = [vec![det(21)], vec![det(40), det(1)]];
        let expected = [vec!["lion".to_string()], vec!["bear".to_string(), "tiger".to_string()]];

        let state = Arc::new(SessionState::default());
        state.activate().unwrap();
        let writer = {
            let state = Arc::clone(&state);
            std::thread::spawn(move || {
                let agg = DetectionAggregator::default();
                for i in 0..1000 {
                    agg.ingest(&state, &frames[i % 2], at(9, 0));
                }
            })
        };

        let mut polls = Vec::new();
        while !writer.is_finished() {
            polls.push(state.take_detection_status());
        }
        writer.join().unwrap();
        polls.push(state.take_detection_status());

        let mut seen = 0usize;
        for status in &polls {
            if status.detected {
                seen += 1;
                assert!(
                    expected.contains(&status.latest_detection),
                    "torn frame: {:?}",
                    status.latest_detection
                );
            } else {
                assert!(status.latest_detection.is_empty());
            }
        }
        assert!(seen >= 1);

        let history = state.history_snapshot();
        assert_eq!(history["lion"].len(), 500);
        assert_eq!(history["tiger"].len(), 500);
        assert_eq!(history["bear"].len(), 500);
        assert_eq!(state.timeline_snapshot().len(), 1000);
        assert!(!state.take_detection_status().detected);
    }
}
