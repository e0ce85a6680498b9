use std::path::Path;

use color_eyre::eyre::{eyre, Result};
use starship_battery::units::ratio::percent;
use starship_battery::Manager;

use super::{is_external_power_online, POWER_SUPPLY_PATH};
use crate::battery::{BatteryProvider, BatteryReading};
use crate::types::ChargeState;

/// Fuel gauge (PMIC) reporting a state of charge through the power-supply class.
///
/// The raw value is the reported percentage rounded to an integer. Gauges can
/// drift past 100 right after a full charge; that value is passed through.
pub struct FuelGauge {
    manager: Manager,
    reading: BatteryReading,
}

impl FuelGauge {
    pub fn new() -> Result<Self> {
        let manager = Manager::new()?;
        let mut gauge = Self {
            manager,
            reading: BatteryReading::default(),
        };
        gauge.refresh()?;
        Ok(gauge)
    }

    pub fn is_supported() -> bool {
        Path::new(POWER_SUPPLY_PATH).exists()
    }
}

impl BatteryProvider for FuelGauge {
    fn refresh(&mut self) -> Result<()> {
        let mut battery = self
            .manager
            .batteries()?
            .next()
            .ok_or_else(|| eyre!("No battery found"))??;

        self.manager.refresh(&mut battery)?;

        let state = ChargeState::from(battery.state());
        self.reading = BatteryReading {
            raw: battery.state_of_charge().get::<percent>().round() as i32,
            state,
            external_connected: is_external_power_online(Path::new(POWER_SUPPLY_PATH)),
        };
        Ok(())
    }

    fn reading(&self) -> &BatteryReading {
        &self.reading
    }

    fn name(&self) -> &'static str {
        "fuel-gauge"
    }
}
