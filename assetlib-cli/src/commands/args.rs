//! Argument types and CLI definitions.
//!
//! This module contains the clap-derived argument types and enums used
//! for parsing command-line arguments.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use assetlib::manifest::LibraryType;

/// Library type argument for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LibraryTypeArg {
    /// The product's default library
    Default,
    /// The user's own library
    User,
    /// An expansion library beside the default library
    Expansion,
}

impl From<LibraryTypeArg> for LibraryType {
    fn from(arg: LibraryTypeArg) -> Self {
        match arg {
            LibraryTypeArg::Default => LibraryType::Default,
            LibraryTypeArg::User => LibraryType::User,
            LibraryTypeArg::Expansion => LibraryType::Expansion,
        }
    }
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Pack a library folder into size-bounded volume archives
    Pack(PackArgs),

    /// Build volumes_catalog.json from the manifests in a dist folder
    Catalog(CatalogArgs),

    /// Install volume archives into the configured libraries
    Install(InstallArgs),

    /// Remove an installed volume
    Uninstall(UninstallArgs),

    /// List installed volumes
    List(ListArgs),

    /// Compare installed volumes with the online catalog
    Check(CheckArgs),

    /// Check installed files against their manifests
    Verify(VerifyArgs),

    /// Create or convert a library folder and register it in the config
    Init(InitArgs),
}

#[derive(Debug, Clone, Args)]
pub struct PackArgs {
    /// Library folder to pack
    pub source: PathBuf,

    /// Output folder for archives and manifests
    pub dist: PathBuf,

    /// Product name (default: from the source library, then config)
    #[arg(long)]
    pub product: Option<String>,

    /// Library name (default: from the source library)
    #[arg(long)]
    pub library_name: Option<String>,

    /// Library type (default: from the source library)
    #[arg(long, value_enum)]
    pub library_type: Option<LibraryTypeArg>,

    /// Library version (default: from the source library)
    #[arg(long)]
    pub library_version: Option<String>,

    /// Version stamped on new volumes
    #[arg(long, default_value = "1")]
    pub volume_version: String,

    /// Maximum compressed volume size, e.g. "2GB" (default: from config)
    #[arg(long)]
    pub max_size: Option<String>,

    /// Pack all tiers into one running set of volumes
    #[arg(long)]
    pub ignore_tier: bool,

    /// Worker threads (default: from config)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Volume names the new volumes supersede
    #[arg(long = "replaces")]
    pub replaces: Vec<String>,

    /// Also rebuild volumes_catalog.json
    #[arg(long)]
    pub catalog: bool,
}

#[derive(Debug, Clone, Args)]
pub struct CatalogArgs {
    /// Folder holding packed volumes and their manifests
    pub dist: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct InstallArgs {
    /// Archive files, or folders containing .zip archives
    #[arg(required = true)]
    pub archives: Vec<PathBuf>,

    /// Re-extract files that already exist with the right size
    #[arg(long)]
    pub overwrite: bool,

    /// Keep archives after a successful install
    #[arg(long)]
    pub keep_archives: bool,

    /// Do not ask for confirmation
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Debug, Clone, Args)]
pub struct UninstallArgs {
    /// Volume name
    pub volume: String,

    /// Library root holding the volume (default: search configured libraries)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Do not ask for confirmation
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Show library root and file counts
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    /// Catalog file to compare against instead of the online catalog
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Catalog URL (default: from config)
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct VerifyArgs {
    /// Only verify this volume
    pub volume: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct InitArgs {
    /// Library folder
    pub path: PathBuf,

    /// Library type
    #[arg(long = "type", value_enum, default_value = "default")]
    pub library_type: LibraryTypeArg,

    /// Library name (default: folder name)
    #[arg(long)]
    pub name: Option<String>,

    /// Library version
    #[arg(long, default_value = "1")]
    pub version: String,

    /// Product name (default: from config)
    #[arg(long)]
    pub product: Option<String>,

    /// Turn an existing folder with content into a library
    #[arg(long)]
    pub convert: bool,
}
