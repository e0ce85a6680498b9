use std::os::unix::process::CommandExt;

use color_eyre::eyre::Result;

use crate::config;
use crate::logging::LogFile;

pub fn run(lines: usize, follow: bool, daemon: bool) -> Result<()> {
    let file = if daemon { LogFile::Daemon } else { LogFile::Cli };
    let log_files = file.existing();

    let Some(path) = log_files.last() else {
        println!(
            "No {} log files found in {:?}",
            file.prefix(),
            config::runtime_dir()
        );
        println!("Log files are created when running the daemon or with --log-level.");
        return Ok(());
    };

    if follow {
        let err = std::process::Command::new("tail")
            .args(["-f", "-n", &lines.to_string()])
            .arg(path)
            .exec();
        return Err(err.into());
    } else {
        std::process::Command::new("tail")
            .args(["-n", &lines.to_string()])
            .arg(path)
            .status()?;
    }

    Ok(())
}
