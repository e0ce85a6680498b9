use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::config::HistoryConfig;
use crate::data::log_store::{ActivityRecord, LogStore, LogStoreError};
use crate::data::sampler::BatterySample;
use crate::data::session_tracker::SessionTracker;

/// Destination for committed activity records.
pub trait ActivitySink {
    type Error;

    fn append(&mut self, record: &ActivityRecord) -> Result<(), Self::Error>;
}

impl ActivitySink for Vec<ActivityRecord> {
    type Error = std::convert::Infallible;

    fn append(&mut self, record: &ActivityRecord) -> Result<(), Self::Error> {
        self.push(record.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    level: i32,
    charging: bool,
    accumulated: Duration,
    last_sample: Instant,
}

/// Collapses a stream of samples into activity records.
///
/// A record is committed when the level moves by at least the threshold, the
/// charging state flips, or the accumulated time reaches the forced-update
/// interval. The committed record carries the level and charging state that
/// were held while the time accumulated.
#[derive(Debug)]
pub struct DebouncedLogger {
    device_serial: String,
    threshold: u32,
    max_duration: Duration,
    pending: Option<Pending>,
}

impl DebouncedLogger {
    pub fn new(device_serial: impl Into<String>, threshold: u32, max_duration: Duration) -> Self {
        Self {
            device_serial: device_serial.into(),
            threshold,
            max_duration,
            pending: None,
        }
    }

    /// Feed one sample. Returns the record committed by it, if any.
    ///
    /// When the sink fails nothing is reset: the same commit is attempted on
    /// the next sample with the extra time folded in.
    pub fn observe<S: ActivitySink>(
        &mut self,
        level: i32,
        charging: bool,
        now: Instant,
        sink: &mut S,
    ) -> Result<Option<ActivityRecord>, S::Error> {
        let Some(pending) = self.pending.as_mut() else {
            self.pending = Some(Pending {
                level,
                charging,
                accumulated: Duration::ZERO,
                last_sample: now,
            });
            return Ok(None);
        };

        pending.accumulated += now.saturating_duration_since(pending.last_sample);
        pending.last_sample = now;

        let level_moved = level.abs_diff(pending.level) >= self.threshold;
        let flipped = charging != pending.charging;
        let overdue = pending.accumulated >= self.max_duration;
        if !(level_moved || flipped || overdue) {
            return Ok(None);
        }

        let secs = pending.accumulated.as_secs();
        let record = ActivityRecord::new(
            self.device_serial.as_str(),
            pending.level,
            secs,
            pending.charging,
        );
        sink.append(&record)?;

        // Sub-second remainder carries into the next record.
        *pending = Pending {
            level,
            charging,
            accumulated: pending.accumulated - Duration::from_secs(secs),
            last_sample: now,
        };
        Ok(Some(record))
    }
}

/// Opens the log store on first append and keeps it for the rest of the sample.
struct StoreSink<'a> {
    path: &'a Path,
    store: Option<LogStore>,
}

impl StoreSink<'_> {
    fn store(&mut self) -> Result<&LogStore, LogStoreError> {
        match &mut self.store {
            Some(store) => Ok(store),
            slot @ None => Ok(slot.insert(LogStore::open(self.path)?)),
        }
    }
}

impl ActivitySink for StoreSink<'_> {
    type Error = LogStoreError;

    fn append(&mut self, record: &ActivityRecord) -> Result<(), Self::Error> {
        let id = self.store()?.insert_activity(record)?;
        trace!(
            id,
            level = record.level,
            duration = record.duration,
            charging = record.charging,
            "Activity committed"
        );
        Ok(())
    }
}

/// Writes the battery history for one device.
pub struct Recorder {
    database_path: PathBuf,
    device_serial: String,
    logger: DebouncedLogger,
    sessions: SessionTracker,
    /// Completed session not yet compared against the stored best.
    unsaved_session: Option<u64>,
}

impl Recorder {
    pub fn new(config: &HistoryConfig, device_serial: impl Into<String>) -> Self {
        let device_serial = device_serial.into();
        let database_path = config.database_path();
        debug!(
            path = %database_path.display(),
            device_serial,
            log_threshold = config.log_threshold,
            max_duration_before_update_secs = config.max_duration_before_update_secs,
            "Recorder initialized"
        );

        Self {
            logger: DebouncedLogger::new(
                device_serial.as_str(),
                config.log_threshold,
                Duration::from_secs(config.max_duration_before_update_secs),
            ),
            database_path,
            device_serial,
            sessions: SessionTracker::new(),
            unsaved_session: None,
        }
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Feed one sample.
    ///
    /// Errors only when a due activity record could not be written. A failed
    /// best-session update is logged and retried on the next sample.
    pub fn record_sample(
        &mut self,
        sample: &BatterySample,
        now: Instant,
    ) -> Result<(), LogStoreError> {
        let mut sink = StoreSink {
            path: &self.database_path,
            store: None,
        };

        let committed = self
            .logger
            .observe(sample.level, sample.charging, now, &mut sink)?;

        if let Some(record) = committed {
            if let Some(session_secs) = self.sessions.observe(&record, sample.charging) {
                self.unsaved_session = Some(
                    self.unsaved_session
                        .map_or(session_secs, |secs| secs.max(session_secs)),
                );
            }
        }

        if let Some(session_secs) = self.unsaved_session {
            let updated = sink
                .store()
                .and_then(|store| update_best_session(store, &self.device_serial, session_secs));
            match updated {
                Ok(()) => self.unsaved_session = None,
                Err(e) => warn!(session_secs, error = %e, "Failed to update best session"),
            }
        }

        if let Some(store) = sink.store.take() {
            store.close();
        }
        Ok(())
    }
}

fn update_best_session(
    store: &LogStore,
    device_serial: &str,
    session_secs: u64,
) -> Result<(), LogStoreError> {
    let best = store.get_best_session(device_serial)?;
    if session_secs > best {
        store.set_best_session(device_serial, session_secs)?;
        info!(session_secs, previous = best, "New best battery session");
    } else {
        debug!(session_secs, best, "Discharge session ended");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct FailingSink;

    impl ActivitySink for FailingSink {
        type Error = ();

        fn append(&mut self, _: &ActivityRecord) -> Result<(), ()> {
            Err(())
        }
    }

    fn pending_time(logger: &DebouncedLogger) -> Duration {
        logger.pending.map(|p| p.accumulated).unwrap_or_default()
    }

    fn logger() -> DebouncedLogger {
        DebouncedLogger::new("dev", 2, Duration::from_secs(600))
    }

    #[test]
    fn test_small_changes_debounced() {
        let mut logger = logger();
        let mut sink: Vec<ActivityRecord> = Vec::new();
        let t0 = Instant::now();

        for (i, level) in [50, 50, 50, 49, 49, 48].into_iter().enumerate() {
            let now = t0 + Duration::from_secs(i as u64);
            logger.observe(level, false, now, &mut sink).unwrap();
        }

        assert_eq!(sink, vec![ActivityRecord::new("dev", 50, 5, false)]);
        assert_eq!(pending_time(&logger), Duration::ZERO);
    }

    #[test]
    fn test_first_sample_only_seeds() {
        let mut logger = logger();
        let mut sink: Vec<ActivityRecord> = Vec::new();
        let committed = logger.observe(10, true, Instant::now(), &mut sink).unwrap();
        assert_eq!(committed, None);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_charger_flip_commits() {
        let mut logger = logger();
        let mut sink: Vec<ActivityRecord> = Vec::new();
        let t0 = Instant::now();

        logger.observe(70, false, t0, &mut sink).unwrap();
        let committed = logger
            .observe(70, true, t0 + Duration::from_secs(15), &mut sink)
            .unwrap();
        assert_eq!(committed, Some(ActivityRecord::new("dev", 70, 15, false)));
    }

    #[test]
    fn test_forced_update_after_max_duration() {
        let mut logger = logger();
        let mut sink: Vec<ActivityRecord> = Vec::new();
        let t0 = Instant::now();

        for i in 0..=40 {
            logger
                .observe(80, false, t0 + Duration::from_secs(i * 15), &mut sink)
                .unwrap();
        }

        assert_eq!(sink, vec![ActivityRecord::new("dev", 80, 600, false)]);
    }

    #[test]
    fn test_durations_are_conserved() {
        let mut logger = logger();
        let mut sink: Vec<ActivityRecord> = Vec::new();
        let t0 = Instant::now();
        let levels = [90, 90, 89, 87, 87, 87, 86, 84, 84, 85, 85, 80];
        let charging = [false, false, false, false, true, true, true, false, false, false, false, false];

        let mut last = t0;
        for (i, (&level, &charging)) in levels.iter().zip(charging.iter()).enumerate() {
            last = t0 + Duration::from_secs(i as u64 * 45);
            logger.observe(level, charging, last, &mut sink).unwrap();
        }

        let committed: u64 = sink.iter().map(|r| r.duration).sum();
        let elapsed = last.duration_since(t0);
        assert_eq!(committed, (elapsed - pending_time(&logger)).as_secs());

        // Every charger flip starts a new record.
        let flips = sink.windows(2).filter(|w| w[0].charging != w[1].charging).count();
        assert_eq!(flips, 2);
    }

    #[test]
    fn test_sub_second_remainders_carry_over() {
        let mut logger = logger();
        let mut sink: Vec<ActivityRecord> = Vec::new();
        let t0 = Instant::now();
        let period = Duration::from_millis(15_200);

        let mut last = t0;
        for i in 0..200u32 {
            last = t0 + period * i;
            let level = 100 - (i / 4 * 2) as i32;
            logger.observe(level, false, last, &mut sink).unwrap();
        }

        assert_eq!(sink.len(), 49);
        let committed: u64 = sink.iter().map(|r| r.duration).sum();
        assert_eq!(
            Duration::from_secs(committed) + pending_time(&logger),
            last.duration_since(t0)
        );
        // Four periods are 60.8 s, so the carried fraction surfaces as 61 s.
        assert!(sink.iter().any(|r| r.duration == 61));
        assert!(pending_time(&logger) < Duration::from_secs(61));
    }

    #[test]
    fn test_failed_append_is_retried_with_extra_time() {
        let mut logger = logger();
        let t0 = Instant::now();

        logger.observe(60, false, t0, &mut FailingSink).unwrap();
        assert!(logger
            .observe(55, false, t0 + Duration::from_secs(15), &mut FailingSink)
            .is_err());

        let mut sink: Vec<ActivityRecord> = Vec::new();
        logger
            .observe(55, false, t0 + Duration::from_secs(30), &mut sink)
            .unwrap();
        assert_eq!(sink, vec![ActivityRecord::new("dev", 60, 30, false)]);
    }

    #[test]
    fn test_recorder_persists_and_tracks_best_session() {
        let dir = tempfile::tempdir().unwrap();
        let config = HistoryConfig {
            database_path: Some(dir.path().join("history.sqlite")),
            ..Default::default()
        };
        let mut recorder = Recorder::new(&config, "dev");
        let t0 = Instant::now();
        let at = |secs| t0 + Duration::from_secs(secs);
        let sample = |level, charging| BatterySample {
            raw: level,
            level,
            charging,
        };

        recorder.record_sample(&sample(80, false), at(0)).unwrap();
        recorder.record_sample(&sample(77, false), at(300)).unwrap();
        recorder.record_sample(&sample(77, true), at(500)).unwrap();

        let store = LogStore::open(recorder.database_path()).unwrap();
        assert_eq!(store.get_best_session("dev").unwrap(), 500);
        store.close();

        recorder.record_sample(&sample(77, false), at(800)).unwrap();
        recorder.record_sample(&sample(77, true), at(900)).unwrap();

        let store = LogStore::open(recorder.database_path()).unwrap();
        assert_eq!(store.get_best_session("dev").unwrap(), 500);

        let mut cursor = store.query_activity("dev").unwrap();
        let records: Vec<_> = cursor.records().unwrap().collect();
        assert_eq!(
            records,
            vec![
                ActivityRecord::new("dev", 77, 100, false),
                ActivityRecord::new("dev", 77, 300, true),
                ActivityRecord::new("dev", 77, 200, false),
                ActivityRecord::new("dev", 80, 300, false),
            ]
        );
    }

    #[test]
    fn test_best_session_survives_failed_update() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.sqlite");
        LogStore::open(&path).unwrap().close();

        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_specifics BEFORE INSERT ON device_specifics
             BEGIN SELECT RAISE(FAIL, 'read-only'); END;",
        )
        .unwrap();
        drop(conn);

        let config = HistoryConfig {
            database_path: Some(path.clone()),
            ..Default::default()
        };
        let mut recorder = Recorder::new(&config, "dev");
        let t0 = Instant::now();
        let at = |secs| t0 + Duration::from_secs(secs);
        let sample = |level, charging| BatterySample {
            raw: level,
            level,
            charging,
        };

        recorder.record_sample(&sample(80, false), at(0)).unwrap();
        recorder.record_sample(&sample(77, false), at(300)).unwrap();
        // Activity rows land even though the best session cannot be stored.
        recorder.record_sample(&sample(77, true), at(500)).unwrap();
        assert_eq!(recorder.unsaved_session, Some(500));

        let store = LogStore::open(&path).unwrap();
        assert_eq!(store.count_activity("dev").unwrap(), 2);
        store.close();

        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("DROP TRIGGER reject_specifics;").unwrap();
        drop(conn);

        recorder.record_sample(&sample(77, true), at(515)).unwrap();
        assert_eq!(recorder.unsaved_session, None);

        let store = LogStore::open(&path).unwrap();
        assert_eq!(store.get_best_session("dev").unwrap(), 500);
    }

    #[test]
    fn test_recorder_reports_unavailable_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = HistoryConfig {
            database_path: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let mut recorder = Recorder::new(&config, "dev");
        let t0 = Instant::now();
        let sample = |level| BatterySample {
            raw: level,
            level,
            charging: false,
        };

        recorder.record_sample(&sample(90), t0).unwrap();
        let result = recorder.record_sample(&sample(80), t0 + Duration::from_secs(60));
        assert!(matches!(result, Err(LogStoreError::StorageUnavailable { .. })));
    }
}
