//! Battery sensing for batmon.
//!
//! This crate provides the hardware-facing side of the battery monitor: a
//! [`BatteryProvider`] trait producing raw readings plus charger state, the
//! Linux implementations behind it, and device identity lookup.
//!
//! # Providers
//!
//! - [`linux::SysfsAdc`] reads a raw SAR ADC value from a sysfs node. The value
//!   still needs a calibration curve to become a percentage.
//! - [`linux::FuelGauge`] reads an already-calibrated state of charge from the
//!   kernel power-supply class via `starship-battery`.
//!
//! # Example
//!
//! ```ignore
//! use batmon_platform::BatteryProvider;
//! use batmon_platform::linux::SysfsAdc;
//!
//! let mut adc = SysfsAdc::new("/sys/bus/iio/devices/iio:device0/in_voltage0_raw", None);
//! adc.refresh()?;
//! println!("raw: {}", adc.reading().raw);
//! ```

mod battery;
mod identity;
mod types;

pub use battery::{BatteryProvider, BatteryReading};
pub use identity::{device_serial, serial_from_candidates, SERIAL_CANDIDATES};
pub use types::ChargeState;

#[cfg(target_os = "linux")]
pub mod linux;
