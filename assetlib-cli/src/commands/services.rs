//! Concrete implementations of the handler traits.
//!
//! These write to the terminal: plain lines on stdout, prompts through
//! `dialoguer`, and install progress through an `indicatif` bar on stderr.

use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use assetlib::manager::{CancelFlag, FileProgress};

use super::traits::{InstallProgress, Output, UserInteraction};
use crate::error::CliError;

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} {msg}";

// ============================================================================
// Console Output Implementation
// ============================================================================

/// Standard console output implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOutput;

impl ConsoleOutput {
    /// Create a new console output.
    pub fn new() -> Self {
        Self
    }
}

impl Output for ConsoleOutput {
    fn println(&self, message: &str) {
        println!("{}", message);
    }

    fn warning(&self, message: &str) {
        println!("{} {}", style("Warning:").yellow().bold(), message);
    }

    fn error(&self, message: &str) {
        println!("{} {}", style("Error:").red().bold(), message);
    }

    fn success(&self, message: &str) {
        println!("{} {}", style("Success:").green().bold(), message);
    }
}

// ============================================================================
// Console User Interaction Implementation
// ============================================================================

/// Interactive prompts on the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleInteraction;

impl ConsoleInteraction {
    /// Create a new console interaction.
    pub fn new() -> Self {
        Self
    }
}

impl UserInteraction for ConsoleInteraction {
    fn confirm(&self, message: &str) -> bool {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(message)
            .default(false)
            .interact()
            .unwrap_or(false)
    }

    fn cancel_on_interrupt(&self, flag: CancelFlag) -> Result<(), CliError> {
        ctrlc::set_handler(move || {
            eprintln!();
            eprintln!("Cancelling after the current file...");
            flag.cancel();
        })
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))
    }
}

// ============================================================================
// Progress Bar Implementation
// ============================================================================

/// Byte-based install progress bar.
///
/// Hidden until [`InstallProgress::begin`] is called, so commands that never
/// install draw nothing.
#[derive(Debug, Clone)]
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallProgress for ConsoleProgress {
    fn begin(&self, total_files: u64, total_bytes: u64) {
        let style = ProgressStyle::with_template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        self.bar.set_style(style);
        self.bar.set_length(total_bytes);
        self.bar.set_position(0);
        self.bar.set_message(format!("0/{} files", total_files));
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
    }

    fn file_done(&self, progress: &FileProgress<'_>) {
        let snapshot = progress.snapshot;
        self.bar.set_position(snapshot.bytes_copied);
        self.bar.set_message(format!(
            "{}/{} files ({})",
            snapshot.files_copied, snapshot.total_files, progress.volume
        ));
        if let Some(error) = progress.error {
            self.bar.println(format!(
                "{} {}: {}",
                style("failed").red(),
                progress.file.relative,
                error
            ));
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
