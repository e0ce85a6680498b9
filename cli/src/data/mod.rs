pub mod forecast;
pub mod history;
pub mod log_store;
pub mod recorder;
pub mod sampler;
pub mod session_tracker;
pub mod timeline;
pub mod viewport;

pub use forecast::format_hours_minutes;
pub use history::build_report;
pub use log_store::{ActivityRecord, LogStore, DATABASE_NAME};
pub use recorder::Recorder;
pub use sampler::{BatterySample, Calibration, Sampler};
pub use timeline::{GraphGeometry, Slot};
pub use viewport::{Viewport, Zoom};
