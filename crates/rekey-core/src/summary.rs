//! Aggregate run counters

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::state::HostOutcome;

/// Totals for one rotation run
///
/// `total == succeeded + failed` holds after every [`RunSummary::record`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
}

impl RunSummary {
    #[must_use]
    pub fn start(at: DateTime<Local>) -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            start_time: at,
            end_time: None,
        }
    }

    /// Count one host's terminal outcome
    pub fn record(&mut self, outcome: HostOutcome) {
        self.total += 1;
        match outcome {
            HostOutcome::Success => self.succeeded += 1,
            HostOutcome::Failed => self.failed += 1,
        }
    }

    /// Stamp the end time; later calls keep the first stamp
    pub fn finish(&mut self, at: DateTime<Local>) {
        self.end_time.get_or_insert(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_add_up() {
        let mut summary = RunSummary::start(Local::now());
        summary.record(HostOutcome::Success);
        summary.record(HostOutcome::Failed);
        summary.record(HostOutcome::Failed);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.total, summary.succeeded + summary.failed);
    }

    #[test]
    fn test_finish_is_once() {
        let start = Local::now();
        let mut summary = RunSummary::start(start);
        assert_eq!(summary.end_time, None);

        let end = start + chrono::Duration::seconds(10);
        summary.finish(end);
        summary.finish(end + chrono::Duration::seconds(10));
        assert_eq!(summary.end_time, Some(end));
    }

    #[test]
    fn test_serializes_counts() {
        let mut summary = RunSummary::start(Local::now());
        summary.record(HostOutcome::Success);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["total"], 1);
        assert_eq!(json["succeeded"], 1);
        assert_eq!(json["failed"], 0);
        assert!(json["end_time"].is_null());
    }
}
