use std::fs;
use std::path::{Path, PathBuf};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::data::BatterySample;

/// Low-battery state derived from the latest sample.
#[derive(Debug)]
pub struct LowBatteryWatch {
    threshold: i32,
    flag_path: PathBuf,
    raised: bool,
}

impl LowBatteryWatch {
    pub fn new(threshold_percent: u8, flag_path: PathBuf) -> Self {
        Self {
            threshold: i32::from(threshold_percent),
            flag_path,
            raised: false,
        }
    }

    /// Raise or clear the flag for one sample.
    pub fn update(&mut self, sample: &BatterySample) {
        let low = !sample.charging && sample.level <= self.threshold;

        if low && !self.raised {
            warn!(level = sample.level, threshold = self.threshold, "Battery low");
            if let Err(e) = fs::write(&self.flag_path, format!("{}\n", sample.level)) {
                warn!(path = %self.flag_path.display(), error = %e, "Cannot write low battery flag");
            }
            self.raised = true;
        } else if !low && self.raised {
            info!(level = sample.level, charging = sample.charging, "Battery no longer low");
            clear_flag(&self.flag_path);
            self.raised = false;
        }
    }

    fn clear(&mut self) {
        if self.raised {
            clear_flag(&self.flag_path);
            self.raised = false;
        }
    }
}

fn clear_flag(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Cannot remove low battery flag");
        }
    }
}

/// Follow the published samples until shutdown.
pub async fn watch_low_battery(
    mut samples: watch::Receiver<Option<BatterySample>>,
    mut shutdown: watch::Receiver<bool>,
    mut state: LowBatteryWatch,
) {
    debug!(threshold = state.threshold, "Low battery watcher started");

    loop {
        tokio::select! {
            changed = samples.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = *samples.borrow_and_update();
                if let Some(sample) = latest {
                    state.update(&sample);
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    state.clear();
    debug!("Low battery watcher stopped");
}
