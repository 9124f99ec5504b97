/// Per-frame aggregation of detections into session history.
///
/// Runs entirely inside one session lock: the filter re-check, the history and
/// timeline appends, and the latest/flag update are observed together or not
/// at all by pollers and history queries.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::classes::ClassTable;
use crate::engine::Detection;
use crate::session::SessionState;

/// What one frame contributed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameOutcome {
    /// Distinct qualifying class names, sorted.
    pub qualifying: BTreeSet<String>,
    /// Selected audio cue, present only when the frame qualified.
    pub cue: Option<String>,
}

impl FrameOutcome {
    pub fn is_detection(&self) -> bool {
        !self.qualifying.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DetectionAggregator {
    table: ClassTable,
}

impl DetectionAggregator {
    pub fn new(table: ClassTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &ClassTable {
        &self.table
    }

    /// Fold one frame's detections into `session` at time `at`.
    ///
    /// Unmapped class IDs are dropped. Names failing the filter as it stands
    /// now (it may have changed since the detect call) are dropped too.
    /// An inactive session records nothing.
    pub fn ingest(&self, session: &SessionState, detections: &[Detection], at: NaiveDateTime) -> FrameOutcome {
        session.update(|data| {
            if !data.active {
                return FrameOutcome::default();
            }

            let qualifying: BTreeSet<String> = detections
                .iter()
                .filter_map(|det| self.table.name_of(det.class_id))
                .filter(|name| data.filter.admits(name))
                .map(str::to_string)
                .collect();

            if qualifying.is_empty() {
                data.latest.clear();
                return FrameOutcome::default();
            }

            for name in &qualifying {
                data.history.entry(name.clone()).or_default().push(at);
            }
            data.timeline.push(at);
            data.latest = qualifying.clone();
            data.detected = true;
            debug!("Frame at {} qualified: {:?}", at, qualifying);

            FrameOutcome { qualifying, cue: Some(data.cue.clone()) }
        })
    }
}
