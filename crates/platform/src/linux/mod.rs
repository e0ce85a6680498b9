mod adc;
mod battery;

pub use adc::SysfsAdc;
pub use battery::FuelGauge;

use std::fs;
use std::path::Path;

pub(crate) const POWER_SUPPLY_PATH: &str = "/sys/class/power_supply";

/// Whether any mains/USB supply under `power_supply` reports `online`.
pub(crate) fn is_external_power_online(power_supply: &Path) -> bool {
    let Ok(entries) = fs::read_dir(power_supply) else {
        return false;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(kind) = fs::read_to_string(path.join("type")) else {
            continue;
        };
        if !matches!(kind.trim(), "Mains" | "USB") {
            continue;
        }
        if let Ok(online) = fs::read_to_string(path.join("online")) {
            if online.trim() == "1" {
                return true;
            }
        }
    }
    false
}
