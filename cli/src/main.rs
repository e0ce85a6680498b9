mod cli;
mod commands;
mod config;
mod daemon;
mod data;
mod logging;

use clap::Parser;
use color_eyre::eyre::Result;

use cli::{Cli, Commands, HistoryCommands};
use config::{ensure_dirs, LogLevel, UserConfig};
use logging::{LogFile, LogMode};

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = ensure_dirs();

    let cli = Cli::parse();
    let config = UserConfig::load();
    let log_level_override = cli.log_level.as_deref().map(LogLevel::from_str);
    let init_logging = |mode| logging::init(config.log_level, mode, LogFile::Cli, log_level_override);

    match cli.command {
        Some(Commands::Debug) => {
            let _guard = init_logging(LogMode::Stderr);
            commands::debug::run()
        }
        Some(Commands::Config { path, reset, edit }) => {
            let _guard = init_logging(LogMode::Stderr);
            commands::config::run(path, reset, edit)
        }
        Some(Commands::Daemon { command }) => {
            commands::daemon::run(command, config.log_level, log_level_override)
        }
        Some(Commands::History { command }) => {
            let _guard = init_logging(LogMode::File);
            commands::history::run(command)
        }
        Some(Commands::Logs {
            lines,
            follow,
            daemon,
        }) => commands::logs::run(lines, follow, daemon),
        None => {
            let _guard = init_logging(LogMode::File);
            commands::history::run(Some(HistoryCommands::Summary { serial: None }))
        }
    }
}
