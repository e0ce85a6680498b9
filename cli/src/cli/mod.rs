mod daemon;
mod history;

pub use daemon::DaemonCommands;
pub use history::{ExportFormat, HistoryCommands};

use clap::{Parser, Subcommand};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the battery provider reading and resolved paths
    Debug,

    /// Show or edit configuration
    Config {
        /// Print config file path
        #[arg(long)]
        path: bool,

        /// Reset config to defaults
        #[arg(long)]
        reset: bool,

        /// Open config file in $EDITOR
        #[arg(short, long)]
        edit: bool,
    },

    /// Manage the background sampler
    Daemon {
        #[command(subcommand)]
        command: DaemonCommands,
    },

    /// View the battery history
    History {
        #[command(subcommand)]
        command: Option<HistoryCommands>,
    },

    /// Show the newest log file
    Logs {
        /// Number of lines to show
        #[arg(short, long, default_value_t = 50)]
        lines: usize,

        /// Follow log output
        #[arg(short, long)]
        follow: bool,

        /// Show the daemon log instead of the CLI log
        #[arg(short, long)]
        daemon: bool,
    },
}

/// Battery history and charge-time estimation for handheld consoles
#[derive(Debug, Parser)]
#[command(name = "batmon", version, verbatim_doc_comment)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}
