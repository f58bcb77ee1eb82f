//! Core traits for the command handler pattern.
//!
//! This module defines the interfaces that handlers depend on, enabling
//! dependency injection and testability.

use std::path::Path;

use assetlib::config::ConfigFile;
use assetlib::manager::{CancelFlag, FileProgress};

use crate::error::CliError;

// ============================================================================
// Output Trait - Abstracts console/UI output
// ============================================================================

/// Trait for outputting messages to the user.
///
/// This abstraction allows handlers to produce output without depending on
/// `println!` directly, making them testable.
pub trait Output: Send + Sync {
    /// Print a line of text.
    fn println(&self, message: &str);

    /// Print an empty line.
    fn newline(&self) {
        self.println("");
    }

    /// Print a section header.
    fn header(&self, title: &str) {
        self.println(title);
        self.println(&"=".repeat(title.len()));
    }

    /// Print an indented line.
    fn indented(&self, message: &str) {
        self.println(&format!("  {}", message));
    }

    /// Print a warning message.
    fn warning(&self, message: &str) {
        self.println(&format!("Warning: {}", message));
    }

    /// Print an error message.
    fn error(&self, message: &str) {
        self.println(&format!("Error: {}", message));
    }

    /// Print a success message.
    fn success(&self, message: &str) {
        self.println(&format!("Success: {}", message));
    }
}

// ============================================================================
// User Interaction Trait
// ============================================================================

/// Trait for user interaction (prompts, interrupts).
pub trait UserInteraction: Send + Sync {
    /// Prompt for yes/no confirmation.
    fn confirm(&self, message: &str) -> bool;

    /// Cancel `flag` when the user interrupts the process.
    fn cancel_on_interrupt(&self, flag: CancelFlag) -> Result<(), CliError>;
}

// ============================================================================
// Install Progress Trait
// ============================================================================

/// Receives install progress for display.
pub trait InstallProgress: Send + Sync {
    /// An install of `total_files` files totalling `total_bytes` is starting.
    fn begin(&self, total_files: u64, total_bytes: u64);

    /// One file was extracted or failed.
    fn file_done(&self, progress: &FileProgress<'_>);

    /// The install has stopped.
    fn finish(&self);
}

// ============================================================================
// Command Context - Bundles dependencies for handlers
// ============================================================================

/// Context providing dependencies to command handlers.
///
/// In production this uses the console implementations; in tests, mocks.
pub struct CommandContext<'a> {
    /// Output interface for user messages.
    pub output: &'a dyn Output,

    /// User interaction for prompts.
    pub interaction: &'a dyn UserInteraction,

    /// Install progress display.
    pub progress: &'a dyn InstallProgress,

    /// Loaded configuration.
    pub config: &'a ConfigFile,

    /// Where configuration changes are saved.
    pub config_path: &'a Path,
}

impl<'a> CommandContext<'a> {
    /// Create a new command context.
    pub fn new(
        output: &'a dyn Output,
        interaction: &'a dyn UserInteraction,
        progress: &'a dyn InstallProgress,
        config: &'a ConfigFile,
        config_path: &'a Path,
    ) -> Self {
        Self {
            output,
            interaction,
            progress,
            config,
            config_path,
        }
    }

    /// Save an updated configuration to the context's config path.
    pub fn save_config(&self, config: &ConfigFile) -> Result<(), CliError> {
        config.save_to(self.config_path)?;
        Ok(())
    }
}

// ============================================================================
// Command Handler Trait
// ============================================================================

/// Trait for command handlers.
///
/// Each subcommand has a handler that implements this trait.
/// Handlers receive their arguments and a context providing dependencies.
pub trait CommandHandler {
    /// The arguments type for this handler.
    type Args;

    /// Execute the command with the given arguments and context.
    fn execute(args: Self::Args, ctx: &CommandContext<'_>) -> Result<(), CliError>;
}
