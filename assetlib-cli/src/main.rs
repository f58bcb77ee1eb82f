//! assetlib CLI - Command-line interface
//!
//! Packs asset libraries into size-bounded volumes and installs, checks and
//! removes those volumes in local libraries.

mod commands;
mod error;

use std::path::PathBuf;

use clap::Parser;

use assetlib::config::{config_file_path, ConfigFile};
use assetlib::logging::init_logging;

use commands::Commands;
use error::CliError;

#[derive(Parser)]
#[command(name = "assetlib")]
#[command(version = assetlib::VERSION)]
#[command(about = "Package and install size-bounded asset library volumes", long_about = None)]
struct Cli {
    /// Config file (default: ~/.assetlib/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(config_file_path);
    let config = ConfigFile::load_from(&config_path)?;

    let _logging = init_logging(&config.logging.directory, &config.logging.file)
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;
    tracing::info!(
        version = assetlib::VERSION,
        config = %config_path.display(),
        "assetlib starting"
    );

    commands::run(cli.command, &config, &config_path)
}
