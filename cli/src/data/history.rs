//! Everything the history views show, built in one pass over the log.

use std::path::Path;

use tracing::warn;

use crate::data::forecast::{estimate, format_hours_minutes, Estimate};
use crate::data::log_store::{LogStore, LogStoreError};
use crate::data::timeline::{reconstruct, GraphGeometry, Timeline};

#[derive(Debug, Clone)]
pub struct HistoryReport {
    pub device_serial: String,
    pub timeline: Timeline,
    pub estimate: Option<Estimate>,
    pub best_session_secs: u64,
}

impl HistoryReport {
    fn empty(device_serial: &str, geometry: &GraphGeometry) -> Self {
        Self {
            device_serial: device_serial.to_string(),
            timeline: Timeline::empty(geometry),
            estimate: None,
            best_session_secs: 0,
        }
    }

    /// Newest logged level as `"NN%"`.
    pub fn current_percent_label(&self) -> String {
        match self.timeline.newest_level {
            Some(level) => format!("{}%", level.clamp(0, 100)),
            None => "--%".to_string(),
        }
    }

    /// Whether the newest segment is a charging one.
    pub fn is_charging(&self) -> bool {
        self.timeline
            .leading_segment
            .map(|span| span.charging)
            .unwrap_or(false)
    }

    /// Length of the newest charging or discharging run.
    pub fn elapsed_label(&self) -> String {
        let secs = self
            .timeline
            .leading_segment
            .map(|span| span.elapsed_secs)
            .unwrap_or(0);
        format_hours_minutes(secs)
    }

    pub fn remaining_label(&self) -> Option<String> {
        self.estimate.as_ref().map(Estimate::label)
    }

    pub fn best_session_label(&self) -> String {
        format_hours_minutes(self.best_session_secs)
    }
}

/// Rebuild the timeline, forecast, and best session for one device.
///
/// Storage problems are logged and degrade to an empty report, so a missing
/// or unreadable log never stops the caller from drawing something.
pub fn build_report(db_path: &Path, device_serial: &str, geometry: &GraphGeometry) -> HistoryReport {
    match load_report(db_path, device_serial, geometry) {
        Ok(report) => report,
        Err(e) => {
            warn!(path = %db_path.display(), error = %e, "Battery history unavailable");
            HistoryReport::empty(device_serial, geometry)
        }
    }
}

fn load_report(
    db_path: &Path,
    device_serial: &str,
    geometry: &GraphGeometry,
) -> Result<HistoryReport, LogStoreError> {
    let store = LogStore::open(db_path)?;

    let best_session_secs = store.get_best_session(device_serial).unwrap_or_else(|e| {
        warn!(error = %e, "Best session unavailable");
        0
    });

    let timeline = {
        let mut cursor = store.query_activity(device_serial)?;
        let timeline = reconstruct(cursor.records()?, geometry);
        timeline
    };
    let (timeline, estimate) = estimate(timeline, geometry);

    store.close();

    Ok(HistoryReport {
        device_serial: device_serial.to_string(),
        timeline,
        estimate,
        best_session_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::log_store::ActivityRecord;

    fn seeded_store(records: &[ActivityRecord]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.sqlite");
        let store = LogStore::open(&path).unwrap();
        // Insert oldest first so ids grow with time.
        for record in records.iter().rev() {
            store.insert_activity(record).unwrap();
        }
        store.close();
        (dir, path)
    }

    #[test]
    fn test_report_with_forecast() {
        let (_dir, path) = seeded_store(&[
            ActivityRecord::new("dev", 60, 600, true),
            ActivityRecord::new("dev", 50, 600, true),
            ActivityRecord::new("dev", 40, 600, true),
            ActivityRecord::new("dev", 70, 3600, false),
            ActivityRecord::new("other", 10, 600, false),
        ]);
        let store = LogStore::open(&path).unwrap();
        store.set_best_session("dev", 11_220).unwrap();
        store.close();

        let report = build_report(&path, "dev", &GraphGeometry::default());
        assert_eq!(report.current_percent_label(), "60%");
        assert!(report.is_charging());
        assert_eq!(report.elapsed_label(), "0h30");
        assert_eq!(report.remaining_label().as_deref(), Some("0h58"));
        assert_eq!(report.best_session_label(), "3h07");
    }

    #[test]
    fn test_report_for_unseen_device() {
        let (_dir, path) = seeded_store(&[ActivityRecord::new("dev", 104, 600, false)]);

        let report = build_report(&path, "new", &GraphGeometry::default());
        assert_eq!(report.device_serial, "new");
        assert!(report.timeline.is_empty());
        assert_eq!(report.current_percent_label(), "--%");
        assert_eq!(report.remaining_label(), None);
        assert_eq!(report.best_session_secs, 0);

        let report = build_report(&path, "dev", &GraphGeometry::default());
        assert_eq!(report.current_percent_label(), "100%");
        assert_eq!(report.timeline.newest_level, Some(104));
    }

    #[test]
    fn test_unavailable_store_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let report = build_report(dir.path(), "dev", &GraphGeometry::default());
        assert!(report.timeline.is_empty());
        assert_eq!(report.best_session_secs, 0);
        assert_eq!(report.elapsed_label(), "0h00");
    }
}
