//! Battery provider trait and reading snapshot.

use color_eyre::eyre::Result;

use crate::types::ChargeState;

/// Battery reading snapshot.
///
/// All values represent the state at the time of the last refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatteryReading {
    /// Raw value as reported by the hardware. For ADC providers this is the
    /// converter output; for fuel gauges it is already a percentage.
    /// Negative values are error sentinels from the driver.
    pub raw: i32,

    /// Charging state reported by the power-management side.
    pub state: ChargeState,

    /// Whether the charger pin / external power is active.
    pub external_connected: bool,
}

impl BatteryReading {
    /// Charging as far as the history log is concerned: external power present
    /// or the gauge says it is charging.
    pub fn is_charging(&self) -> bool {
        self.external_connected || self.state.is_charging()
    }
}

/// A source of battery readings.
///
/// Implementations keep the latest reading and update it on [`refresh`].
///
/// [`refresh`]: BatteryProvider::refresh
pub trait BatteryProvider {
    /// Re-read the hardware.
    fn refresh(&mut self) -> Result<()>;

    /// The reading captured by the last successful refresh.
    fn reading(&self) -> &BatteryReading;

    /// Short provider name for logs and `batmon debug`.
    fn name(&self) -> &'static str;
}
