use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::data::{Calibration, GraphGeometry, DATABASE_NAME};

const APP_DIR: &str = "batmon";
const UNKNOWN_SERIAL: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "off" => LogLevel::Off,
            "error" => LogLevel::Error,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Warn,
        }
    }

    pub fn as_tracing_level(&self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// Where raw battery readings come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// SAR ADC node; needs a calibration curve.
    #[default]
    Adc,
    /// PMIC fuel gauge reporting percent; use passthrough calibration.
    FuelGauge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub interval_secs: u64,
    pub provider: ProviderKind,
    pub adc_path: PathBuf,
    pub charger_path: Option<PathBuf>,
    pub smoothing_window: usize,
    pub calibration: Calibration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 15,
            provider: ProviderKind::Adc,
            adc_path: PathBuf::from("/sys/bus/iio/devices/iio:device0/in_voltage0_raw"),
            charger_path: None,
            smoothing_window: 5,
            calibration: Calibration::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    /// Minimum percent change that opens a new log row.
    pub log_threshold: u32,
    /// Force a row after this long even without a level change.
    pub max_duration_before_update_secs: u64,
    pub database_path: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_threshold: 2,
            max_duration_before_update_secs: 600,
            database_path: None,
        }
    }
}

impl HistoryConfig {
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| data_dir().join(DATABASE_NAME))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarningConfig {
    pub enabled: bool,
    pub threshold_percent: u8,
}

impl Default for WarningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_percent: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub log_level: LogLevel,
    /// Overrides the serial read from the device.
    pub device_serial: Option<String>,
    pub sampler: SamplerConfig,
    pub history: HistoryConfig,
    pub graph: GraphGeometry,
    pub warning: WarningConfig,
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join(APP_DIR)
}

pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join(APP_DIR)
}

pub fn runtime_dir() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(APP_DIR)
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

pub fn ensure_dirs() -> std::io::Result<()> {
    fs::create_dir_all(config_dir())?;
    fs::create_dir_all(runtime_dir())?;
    Ok(())
}

impl UserConfig {
    pub fn load() -> Self {
        let path = config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Parse TOML, falling back to defaults on any error.
    pub fn parse(content: &str) -> Self {
        toml::from_str(content).unwrap_or_default()
    }

    pub fn save(&self) -> std::io::Result<()> {
        let _ = ensure_dirs();
        let path = config_path();
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        fs::write(path, content)
    }

    /// Serial used to key this device's rows in the log store.
    pub fn resolve_device_serial(&self) -> String {
        if let Some(serial) = self.device_serial.as_ref().filter(|s| !s.trim().is_empty()) {
            return serial.trim().to_string();
        }
        batmon_platform::device_serial().unwrap_or_else(|| UNKNOWN_SERIAL.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = UserConfig::parse("");
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.sampler.interval_secs, 15);
        assert_eq!(config.sampler.provider, ProviderKind::Adc);
        assert_eq!(config.history.log_threshold, 2);
        assert_eq!(config.history.max_duration_before_update_secs, 600);
        assert_eq!(config.graph, GraphGeometry::default());
        assert!(config.warning.enabled);
    }

    #[test]
    fn test_partial_sections() {
        let config = UserConfig::parse(
            r#"
            log_level = "debug"
            device_serial = "MMP-1"

            [sampler]
            provider = "fuel-gauge"
            calibration = { kind = "passthrough" }

            [history]
            log_threshold = 5
            "#,
        );
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.resolve_device_serial(), "MMP-1");
        assert_eq!(config.sampler.provider, ProviderKind::FuelGauge);
        assert_eq!(config.sampler.calibration, Calibration::Passthrough);
        assert_eq!(config.sampler.interval_secs, 15);
        assert_eq!(config.history.log_threshold, 5);
        assert_eq!(config.history.max_duration_before_update_secs, 600);
    }

    #[test]
    fn test_invalid_config_falls_back() {
        let config = UserConfig::parse("sampler = 12");
        assert_eq!(config.sampler.interval_secs, 15);
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("TRACE"), LogLevel::Trace);
        assert_eq!(LogLevel::from_str("bogus"), LogLevel::Warn);
        assert!(LogLevel::Off.as_tracing_level().is_none());
        assert_eq!(LogLevel::Info.as_tracing_level(), Some(Level::INFO));
    }
}
