//! Device identity lookup.
//!
//! Battery logs are keyed by device serial so that one SD card moved between
//! consoles keeps separate histories.

use std::fs;
use std::path::Path;

use tracing::debug;

/// Files probed for a device serial, in order.
pub const SERIAL_CANDIDATES: &[&str] = &[
    "/proc/device-tree/serial-number",
    "/sys/class/dmi/id/product_serial",
    "/etc/machine-id",
];

/// Resolve the serial of the running device, if any candidate file yields one.
pub fn device_serial() -> Option<String> {
    serial_from_candidates(SERIAL_CANDIDATES.iter().map(Path::new))
}

/// Return the first non-empty serial found among `candidates`.
///
/// Device-tree strings are NUL terminated, so trailing NULs and whitespace are
/// stripped.
pub fn serial_from_candidates<'a, I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a Path>,
{
    for path in candidates {
        let Ok(content) = fs::read_to_string(path) else {
            continue;
        };
        let serial = content.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        if !serial.is_empty() {
            debug!(path = %path.display(), "Resolved device serial");
            return Some(serial.to_string());
        }
    }
    None
}
