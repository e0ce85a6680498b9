use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};

use crate::data::Zoom;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommands {
    /// Current level, session length, forecast and best session (default)
    Summary {
        /// Device serial to report on (defaults to this device)
        #[arg(short, long)]
        serial: Option<String>,
    },

    /// Draw the history graph in the terminal
    Graph {
        /// Time span on screen: 16h, 8h, 4h
        #[arg(short, long, default_value = "8h")]
        zoom: Zoom,

        /// Scroll back this many steps
        #[arg(short, long, default_value_t = 0)]
        page: usize,

        /// Graph width in terminal columns
        #[arg(short, long, default_value_t = 72)]
        width: usize,

        /// Device serial to draw (defaults to this device)
        #[arg(short, long)]
        serial: Option<String>,
    },

    /// Export activity records
    Export {
        /// Output file path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Export every device instead of only this one
        #[arg(long)]
        all: bool,
    },

    /// Database statistics
    Stats,
}
