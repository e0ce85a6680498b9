use tracing::trace;

use crate::data::log_store::ActivityRecord;

/// Tracks the length of the current discharge session from committed records.
///
/// A session is the run of discharge records between two charges. It closes
/// when a committed discharge record was cut by the charger being plugged in.
#[derive(Debug, Default)]
pub struct SessionTracker {
    discharge_secs: u64,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a committed record together with the charging state that follows it.
    ///
    /// Returns the completed session length when this commit closes one.
    pub fn observe(&mut self, committed: &ActivityRecord, now_charging: bool) -> Option<u64> {
        if committed.charging {
            self.discharge_secs = 0;
            return None;
        }

        self.discharge_secs += committed.duration;
        if !now_charging {
            return None;
        }

        let completed = std::mem::take(&mut self.discharge_secs);
        trace!(completed, "Discharge session closed");
        (completed > 0).then_some(completed)
    }
}
