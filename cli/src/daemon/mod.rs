mod server;
mod warning;

pub(crate) use server::open_provider;
pub use server::{run_daemon, DaemonError};

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::runtime_dir;

const PID_FILE: &str = "batmon.pid";
const STATUS_FILE: &str = "battery_percent";
const LOW_BATTERY_FLAG: &str = "low_battery";

pub fn pid_path() -> PathBuf {
    runtime_dir().join(PID_FILE)
}

/// Latest sampled percentage, rewritten after every sample.
pub fn status_path() -> PathBuf {
    runtime_dir().join(STATUS_FILE)
}

/// Present while the battery is low and not charging.
pub fn low_battery_flag_path() -> PathBuf {
    runtime_dir().join(LOW_BATTERY_FLAG)
}

fn read_pid(path: &Path) -> Option<i32> {
    fs::read_to_string(path)
        .ok()?
        .trim()
        .parse()
        .ok()
        .filter(|pid| *pid > 0)
}

fn is_process_alive(pid: i32) -> bool {
    // SAFETY: signal 0 performs only the existence and permission checks;
    // nothing is delivered to the target process.
    let result = unsafe { libc::kill(pid, 0) };
    result == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Pid of the running daemon, if the pid file points at a live process.
pub fn running_pid() -> Option<i32> {
    read_pid(&pid_path()).filter(|pid| is_process_alive(*pid))
}

pub fn is_daemon_running() -> bool {
    running_pid().is_some()
}

/// Ask the running daemon to shut down. Returns the signalled pid.
pub fn stop_daemon() -> Result<i32, DaemonError> {
    let pid = running_pid().ok_or(DaemonError::NotRunning)?;

    // SAFETY: `pid` was read from our own pid file and checked to be alive;
    // SIGTERM asks it to run its shutdown path.
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        return Err(DaemonError::Io(std::io::Error::last_os_error()));
    }
    Ok(pid)
}

/// Last percentage published by the daemon.
pub fn read_status(path: &Path) -> Option<i32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}
