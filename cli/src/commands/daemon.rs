use std::time::Duration;

use color_eyre::eyre::{eyre, Result};

use crate::cli::DaemonCommands;
use crate::config::{LogLevel, UserConfig};
use crate::daemon::{
    is_daemon_running, low_battery_flag_path, pid_path, read_status, run_daemon, running_pid,
    status_path, stop_daemon, DaemonError,
};
use crate::logging::{self, LogFile, LogMode};

pub fn run(
    command: DaemonCommands,
    log_level: LogLevel,
    log_level_override: Option<LogLevel>,
) -> Result<()> {
    match command {
        DaemonCommands::Start { foreground } => {
            if let Some(pid) = running_pid() {
                println!("Daemon is already running (pid {pid}).");
                return Ok(());
            }

            let _guard = foreground.then(|| {
                logging::init(log_level, LogMode::Both, LogFile::Daemon, log_level_override)
            });
            if foreground {
                println!("Starting daemon in foreground...");
                println!("Press Ctrl+C to stop.");
            } else {
                println!("Starting daemon...");
                println!("Check `batmon daemon status` or `batmon logs --daemon`.");
            }
            run_daemon(foreground, log_level, log_level_override)
                .map_err(|e| eyre!("{}", e))?;
        }
        DaemonCommands::Stop => match stop_daemon() {
            Ok(pid) => {
                for _ in 0..25 {
                    if !is_daemon_running() {
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(200));
                }
                if is_daemon_running() {
                    println!("Sent SIGTERM to pid {pid}; daemon is still shutting down.");
                } else {
                    println!("Daemon stopped.");
                }
            }
            Err(DaemonError::NotRunning) => println!("Daemon is not running."),
            Err(e) => return Err(eyre!("{}", e)),
        },
        DaemonCommands::Status => print_status(),
    }

    Ok(())
}

fn print_status() {
    let config = UserConfig::load();
    let database = config.history.database_path();

    println!("Daemon Status");
    println!("{}", "-".repeat(40));

    match running_pid() {
        Some(pid) => {
            println!("Running:      yes (pid {pid})");
            if let Some(uptime) = file_age(&pid_path()) {
                println!("Uptime:       {}", humantime::format_duration(uptime));
            }
        }
        None => println!("Running:      no"),
    }

    match read_status(&status_path()) {
        Some(level) => {
            let age = file_age(&status_path())
                .map(|d| format!(" ({} ago)", humantime::format_duration(d)))
                .unwrap_or_default();
            println!("Battery:      {level}%{age}");
        }
        None => println!("Battery:      unknown"),
    }
    println!(
        "Low battery:  {}",
        if low_battery_flag_path().exists() { "yes" } else { "no" }
    );
    println!("Interval:     {}s", config.sampler.interval_secs);
    println!("Database:     {}", database.display());
}

/// Time since a file was last written, truncated to whole seconds.
fn file_age(path: &std::path::Path) -> Option<Duration> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let age = modified.elapsed().ok()?;
    Some(Duration::from_secs(age.as_secs()))
}
