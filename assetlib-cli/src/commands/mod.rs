//! CLI commands for packing, installing and managing library volumes.
//!
//! This module implements the Command Pattern with trait-based dependency
//! injection:
//!
//! - `traits`: Core interfaces (`Output`, `UserInteraction`, `InstallProgress`, `CommandHandler`)
//! - `services`: Terminal implementations of the traits
//! - `args`: CLI argument types (clap-derived)
//! - `handlers`: Command handlers implementing business logic
//!
//! Each handler depends only on trait interfaces via `CommandContext`, so it
//! can be tested in isolation with mock implementations.

mod args;
mod handlers;
mod services;
mod traits;

pub use args::Commands;
pub use traits::CommandHandler;

use std::path::Path;

use assetlib::config::ConfigFile;

use handlers::{
    CatalogHandler, CheckHandler, InitHandler, InstallHandler, ListHandler, PackHandler,
    UninstallHandler, VerifyHandler,
};
use services::{ConsoleInteraction, ConsoleOutput, ConsoleProgress};
use traits::CommandContext;

use crate::error::CliError;

/// Run a subcommand against the loaded configuration.
///
/// Creates the production context with terminal implementations and
/// dispatches to the matching handler. Configuration changes are saved to
/// `config_path`.
pub fn run(command: Commands, config: &ConfigFile, config_path: &Path) -> Result<(), CliError> {
    let output = ConsoleOutput::new();
    let interaction = ConsoleInteraction::new();
    let progress = ConsoleProgress::new();
    let ctx = CommandContext::new(&output, &interaction, &progress, config, config_path);

    match command {
        Commands::Pack(args) => PackHandler::execute(args, &ctx),
        Commands::Catalog(args) => CatalogHandler::execute(args, &ctx),
        Commands::Install(args) => InstallHandler::execute(args, &ctx),
        Commands::Uninstall(args) => UninstallHandler::execute(args, &ctx),
        Commands::List(args) => ListHandler::execute(args, &ctx),
        Commands::Check(args) => CheckHandler::execute(args, &ctx),
        Commands::Verify(args) => VerifyHandler::execute(args, &ctx),
        Commands::Init(args) => InitHandler::execute(args, &ctx),
    }
}
