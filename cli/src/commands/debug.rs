use std::path::Path;

use color_eyre::eyre::Result;

use crate::config::{self, config_path, UserConfig};
use crate::daemon::{self, open_provider};
use crate::data::LogStore;

pub fn run() -> Result<()> {
    let config = UserConfig::load();

    println!("batmon debug information");
    println!("{}", "=".repeat(60));

    println!("\n--- Device ---");
    println!("Serial: {}", config.resolve_device_serial());
    if let Some(serial) = &config.device_serial {
        println!("  (overridden in config: {serial})");
    }
    for candidate in batmon_platform::SERIAL_CANDIDATES {
        let found = if Path::new(candidate).exists() { "present" } else { "missing" };
        println!("  {candidate}: {found}");
    }

    println!("\n--- Battery Provider ---");
    println!("Configured: {:?}", config.sampler.provider);
    match open_provider(&config.sampler) {
        Ok(mut provider) => {
            println!("Provider: {}", provider.name());
            match provider.refresh() {
                Ok(()) => {
                    let reading = *provider.reading();
                    println!("Raw value: {}", reading.raw);
                    println!("State: {}", reading.state);
                    println!("External power: {}", reading.external_connected);
                    println!("Charging: {}", reading.is_charging());
                    if reading.raw >= 0 {
                        println!(
                            "Calibrated level: {}%",
                            config.sampler.calibration.apply(reading.raw)
                        );
                    } else {
                        println!("Raw value is a driver error sentinel");
                    }
                }
                Err(e) => println!("Read failed: {e}"),
            }
        }
        Err(e) => println!("Unavailable: {e}"),
    }

    println!("\n--- Paths ---");
    println!("Config: {}", config_path().display());
    println!("Runtime: {}", config::runtime_dir().display());
    println!("Pid file: {}", daemon::pid_path().display());
    println!("Status file: {}", daemon::status_path().display());

    let database = config.history.database_path();
    println!("Database: {}", database.display());
    if database.exists() {
        match LogStore::open(&database) {
            Ok(store) => {
                println!("  size: {} bytes", store.size_bytes());
                store.close();
            }
            Err(e) => println!("  unreadable: {e}"),
        }
    } else {
        println!("  not created yet");
    }

    println!("\n--- Daemon ---");
    match daemon::running_pid() {
        Some(pid) => println!("Running (pid {pid})"),
        None => println!("Not running"),
    }

    Ok(())
}
