use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum DaemonCommands {
    /// Start sampling the battery
    Start {
        /// Run in foreground (don't daemonize)
        #[arg(short, long)]
        foreground: bool,
    },

    /// Stop the running daemon
    Stop,

    /// Check daemon status
    Status,
}
