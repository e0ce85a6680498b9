use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use batmon_platform::BatteryProvider;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::{runtime_dir, LogLevel, ProviderKind, SamplerConfig, UserConfig};
use crate::daemon::warning::{watch_low_battery, LowBatteryWatch};
use crate::daemon::{low_battery_flag_path, pid_path, running_pid, status_path};
use crate::data::{BatterySample, Recorder, Sampler};
use crate::logging::{self, LogFile, LogMode};

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Already running (pid {0})")]
    AlreadyRunning(i32),

    #[error("Daemon is not running")]
    NotRunning,

    #[error("Failed to daemonize: {0}")]
    Daemonize(String),

    #[error("Battery hardware unavailable: {0}")]
    Hardware(String),
}

pub type Result<T> = std::result::Result<T, DaemonError>;

/// Removes the pid file when the daemon exits, however it exits.
struct PidFileGuard(PathBuf);

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

pub fn run_daemon(
    foreground: bool,
    log_level: LogLevel,
    log_level_override: Option<LogLevel>,
) -> Result<()> {
    if let Some(pid) = running_pid() {
        return Err(DaemonError::AlreadyRunning(pid));
    }

    let pid_file = pid_path();
    if pid_file.exists() {
        debug!(path = %pid_file.display(), "Removing stale pid file");
        fs::remove_file(&pid_file)?;
    }

    fs::create_dir_all(runtime_dir())?;

    if foreground {
        fs::write(&pid_file, format!("{}\n", std::process::id()))?;
    } else {
        daemonize::Daemonize::new()
            .working_directory(runtime_dir())
            .pid_file(&pid_file)
            .start()
            .map_err(|e| DaemonError::Daemonize(e.to_string()))?;
        let guard = logging::init(log_level, LogMode::File, LogFile::Daemon, log_level_override);
        std::mem::forget(guard);
    }
    let _pid_guard = PidFileGuard(pid_file);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "Daemon starting"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let local = tokio::task::LocalSet::new();
    let result = local.block_on(&runtime, run_daemon_async(UserConfig::load()));

    if let Err(e) = &result {
        error!(error = %e, "Daemon stopped with error");
    } else {
        info!("Daemon stopped");
    }
    result
}

async fn run_daemon_async(config: UserConfig) -> Result<()> {
    let device_serial = config.resolve_device_serial();
    let provider = open_provider(&config.sampler)?;
    let mut sampler = Sampler::new(
        provider,
        config.sampler.calibration.clone(),
        config.sampler.smoothing_window,
    );

    let mut recorder = if config.history.enabled {
        Some(Recorder::new(&config.history, device_serial.as_str()))
    } else {
        info!("History recording disabled");
        None
    };

    info!(
        device_serial,
        provider = sampler.provider_name(),
        interval_secs = config.sampler.interval_secs,
        "Sampling battery"
    );

    let (sample_tx, sample_rx) = watch::channel::<Option<BatterySample>>(None);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let watcher = config.warning.enabled.then(|| {
        tokio::task::spawn_local(watch_low_battery(
            sample_rx,
            shutdown_rx,
            LowBatteryWatch::new(config.warning.threshold_percent, low_battery_flag_path()),
        ))
    });

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let mut sample_tick =
        tokio::time::interval(Duration::from_secs(config.sampler.interval_secs.max(1)));
    sample_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let status_file = status_path();

    loop {
        tokio::select! {
            _ = sample_tick.tick() => {
                let sample = match sampler.sample() {
                    Ok(sample) => sample,
                    Err(e) => {
                        warn!(error = %e, "Skipping battery sample");
                        continue;
                    }
                };

                publish_status(&status_file, &sample);
                sample_tx.send_replace(Some(sample));

                if let Some(recorder) = recorder.as_mut() {
                    if let Err(e) = recorder.record_sample(&sample, Instant::now()) {
                        warn!(error = %e, "Failed to record battery activity");
                    }
                }
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    if let Some(watcher) = watcher {
        if let Err(e) = watcher.await {
            warn!(error = %e, "Low battery watcher failed");
        }
    }

    let _ = fs::remove_file(&status_file);
    Ok(())
}

fn publish_status(path: &Path, sample: &BatterySample) {
    let level = sample.level.clamp(0, 100);
    if let Err(e) = fs::write(path, format!("{level}\n")) {
        debug!(path = %path.display(), error = %e, "Cannot publish battery status");
    }
}

#[cfg(target_os = "linux")]
pub(crate) fn open_provider(config: &SamplerConfig) -> Result<Box<dyn BatteryProvider>> {
    use batmon_platform::linux::{FuelGauge, SysfsAdc};

    match config.provider {
        ProviderKind::Adc => {
            if !SysfsAdc::is_supported(&config.adc_path) {
                return Err(DaemonError::Hardware(format!(
                    "ADC node {} not found",
                    config.adc_path.display()
                )));
            }
            Ok(Box::new(SysfsAdc::new(
                config.adc_path.clone(),
                config.charger_path.clone(),
            )))
        }
        ProviderKind::FuelGauge => {
            if !FuelGauge::is_supported() {
                return Err(DaemonError::Hardware(
                    "no power-supply class in sysfs".to_string(),
                ));
            }
            let gauge = FuelGauge::new().map_err(|e| DaemonError::Hardware(e.to_string()))?;
            Ok(Box::new(gauge))
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn open_provider(config: &SamplerConfig) -> Result<Box<dyn BatteryProvider>> {
    Err(DaemonError::Hardware(format!(
        "no {:?} provider on this platform",
        config.provider
    )))
}
