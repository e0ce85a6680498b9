use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, Result, WrapErr};

use super::{is_external_power_online, POWER_SUPPLY_PATH};
use crate::battery::{BatteryProvider, BatteryReading};
use crate::types::ChargeState;

/// Raw SAR ADC exposed through sysfs (IIO `in_voltageN_raw` or a vendor node).
///
/// Charger state comes from `charger_path` when given (a GPIO `value` file
/// holding `0`/`1`), otherwise from the power-supply class.
pub struct SysfsAdc {
    raw_path: PathBuf,
    charger_path: Option<PathBuf>,
    power_supply: PathBuf,
    reading: BatteryReading,
}

impl SysfsAdc {
    pub fn new(raw_path: impl Into<PathBuf>, charger_path: Option<PathBuf>) -> Self {
        Self {
            raw_path: raw_path.into(),
            charger_path,
            power_supply: PathBuf::from(POWER_SUPPLY_PATH),
            reading: BatteryReading::default(),
        }
    }

    pub fn is_supported(raw_path: &Path) -> bool {
        raw_path.exists()
    }

    fn read_raw(&self) -> Result<i32> {
        let content = fs::read_to_string(&self.raw_path)
            .wrap_err_with(|| format!("reading {}", self.raw_path.display()))?;
        content
            .trim()
            .parse::<i32>()
            .map_err(|e| eyre!("invalid ADC value {:?}: {}", content.trim(), e))
    }

    fn read_charger(&self) -> bool {
        match &self.charger_path {
            Some(path) => fs::read_to_string(path)
                .map(|v| v.trim() == "1")
                .unwrap_or(false),
            None => is_external_power_online(&self.power_supply),
        }
    }
}

impl BatteryProvider for SysfsAdc {
    fn refresh(&mut self) -> Result<()> {
        let raw = self.read_raw()?;
        let external_connected = self.read_charger();
        self.reading = BatteryReading {
            raw,
            state: if external_connected {
                ChargeState::Charging
            } else {
                ChargeState::Discharging
            },
            external_connected,
        };
        Ok(())
    }

    fn reading(&self) -> &BatteryReading {
        &self.reading
    }

    fn name(&self) -> &'static str {
        "sysfs-adc"
    }
}
