//! Command handlers implementing business logic.
//!
//! Each handler implements the `CommandHandler` trait and depends only on
//! trait interfaces via `CommandContext`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assetlib::config::{config_directory, display_size, parse_size};
use assetlib::library::{LibraryRoot, LibraryScanner};
use assetlib::manager::{
    compare_against_catalog, validate_new_root, verify_volume, CatalogSource, FileCatalogSource,
    FileProgress, HttpCatalogSource, InstallOptions, InstalledVolumeRegistry, ManagerConfig,
    ManagerError, VolumeInstaller, VolumeUninstaller,
};
use assetlib::manifest::{LibraryInfo, LibraryType, VolumeIdentity};
use assetlib::publisher::{build_catalog, PackOptions, VolumePacker};
use tracing::info;

use super::args::{
    CatalogArgs, CheckArgs, InitArgs, InstallArgs, ListArgs, PackArgs, UninstallArgs, VerifyArgs,
};
use super::traits::{CommandContext, CommandHandler};
use crate::error::CliError;

/// File name of the cached online catalog inside the config directory.
const CATALOG_CACHE_FILE: &str = "volumes_catalog.json";

// ============================================================================
// Pack Handler
// ============================================================================

/// Handler for the `pack` command.
pub struct PackHandler;

impl CommandHandler for PackHandler {
    type Args = PackArgs;

    fn execute(args: Self::Args, ctx: &CommandContext<'_>) -> Result<(), CliError> {
        let source_info = LibraryRoot::open(&args.source).ok().map(|r| r.info().clone());
        let identity = pack_identity(&args, source_info.as_ref(), ctx);

        let max_volume_size = match &args.max_size {
            Some(size) => parse_size(size).map_err(|e| CliError::Config(e.to_string()))?,
            None => ctx.config.packer.max_volume_size,
        };
        let options = PackOptions::new(&args.dist, identity)
            .with_max_volume_size(max_volume_size)
            .with_ignore_tier(args.ignore_tier || ctx.config.packer.ignore_tier)
            .with_threads(args.threads.unwrap_or(ctx.config.packer.threads))
            .with_replaces(args.replaces.clone());

        ctx.output.header(&format!("Packing {}", args.source.display()));
        let scan = LibraryScanner::new().scan(&args.source)?;
        ctx.output.indented(&format!(
            "{} files, {} in {} assets",
            scan.file_count(),
            display_size(scan.total_size()),
            scan.units().len()
        ));
        if !scan.ignored().is_empty() {
            ctx.output.warning(&format!(
                "{} entries outside category/asset folders were ignored",
                scan.ignored().len()
            ));
        }
        ctx.output.newline();

        let report = VolumePacker::new().pack(&scan, &options)?;
        if report.volumes.is_empty() {
            ctx.output.println(&format!(
                "Nothing new to pack ({} files already archived).",
                report.already_archived
            ));
        } else {
            for volume in &report.volumes {
                ctx.output.indented(&format!(
                    "{}: {} files, {} ({} compressed)",
                    volume.manifest.volume_name,
                    volume.manifest.total_files,
                    display_size(volume.manifest.uncompressed_size),
                    display_size(volume.archive_size)
                ));
            }
            ctx.output.newline();
            ctx.output.success(&format!(
                "Packed {} volume(s), {} files, {}",
                report.volumes.len(),
                report.total_files(),
                display_size(report.total_size())
            ));
        }

        if args.catalog {
            write_catalog(&args.dist, ctx)?;
        }
        Ok(())
    }
}

/// Identity for new volumes: flags first, then the source library, then config.
fn pack_identity(
    args: &PackArgs,
    source: Option<&LibraryInfo>,
    ctx: &CommandContext<'_>,
) -> VolumeIdentity {
    let folder_name = args
        .source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Default".to_string());

    VolumeIdentity {
        product: args
            .product
            .clone()
            .or_else(|| source.map(|s| s.library_product.clone()))
            .unwrap_or_else(|| ctx.config.library.product.clone()),
        library_name: args
            .library_name
            .clone()
            .or_else(|| source.map(|s| s.library_name.clone()))
            .unwrap_or(folder_name),
        library_type: args
            .library_type
            .map(LibraryType::from)
            .or_else(|| source.map(|s| s.library_type))
            .unwrap_or(LibraryType::Default),
        library_version: args
            .library_version
            .clone()
            .or_else(|| source.map(|s| s.library_version.clone()))
            .unwrap_or_else(|| "1".to_string()),
        volume_version: args.volume_version.clone(),
    }
}

fn write_catalog(dist: &Path, ctx: &CommandContext<'_>) -> Result<(), CliError> {
    let (path, catalog) = build_catalog(dist)?;
    ctx.output.success(&format!(
        "Catalog of {} volume(s) written to {}",
        catalog.len(),
        path.display()
    ));
    Ok(())
}

// ============================================================================
// Catalog Handler
// ============================================================================

/// Handler for the `catalog` command.
pub struct CatalogHandler;

impl CommandHandler for CatalogHandler {
    type Args = CatalogArgs;

    fn execute(args: Self::Args, ctx: &CommandContext<'_>) -> Result<(), CliError> {
        write_catalog(&args.dist, ctx)
    }
}

// ============================================================================
// Install Handler
// ============================================================================

/// Handler for the `install` command.
pub struct InstallHandler;

impl CommandHandler for InstallHandler {
    type Args = InstallArgs;

    fn execute(args: Self::Args, ctx: &CommandContext<'_>) -> Result<(), CliError> {
        let archives = collect_archives(&args.archives)?;
        if archives.is_empty() {
            ctx.output.println("No archives found.");
            return Ok(());
        }

        let installer = VolumeInstaller::new(ManagerConfig::from_config_file(ctx.config)?);
        let defaults = installer.default_options();
        let options = InstallOptions::new()
            .with_overwrite(args.overwrite || defaults.overwrite)
            .with_keep_archives(args.keep_archives || defaults.keep_archives);

        let mut job = installer.prepare(&archives, &options)?;

        ctx.output.header("Installation plan");
        for plan in job.plans() {
            ctx.output.indented(&format!(
                "{} -> {} ({} files, {}; {} already in place)",
                plan.volume_name(),
                plan.root.display(),
                plan.files_to_copy.len(),
                display_size(plan.planned_bytes()),
                plan.satisfied
            ));
        }
        for bad in job.bad_archives() {
            ctx.output
                .warning(&format!("Skipping {}: {}", bad.path.display(), bad.reason));
        }
        for root in job.new_roots() {
            ctx.output
                .indented(&format!("New expansion library: {}", root.display()));
        }
        ctx.output.newline();

        let prompt = format!(
            "Install {} volume(s), {} to extract?",
            job.plans().len(),
            display_size(job.planned_bytes())
        );
        if !args.yes && !ctx.interaction.confirm(&prompt) {
            ctx.output.println("Installation aborted.");
            return Ok(());
        }

        ctx.interaction.cancel_on_interrupt(job.cancel_flag())?;
        ctx.progress
            .begin(job.files_to_copy() as u64, job.planned_bytes());
        let on_file = |progress: &FileProgress<'_>| ctx.progress.file_done(progress);
        let result = installer.run(&mut job, Some(&on_file));
        ctx.progress.finish();
        let report = result?;

        for (volume, errors) in &report.failed {
            ctx.output
                .error(&format!("{}: {} file(s) failed", volume, errors.len()));
            for error in errors {
                ctx.output.indented(&format!("{}: {}", error.path, error.reason));
            }
        }

        if !report.new_roots.is_empty() {
            let mut config = ctx.config.clone();
            for root in &report.new_roots {
                if !config.library.expansion_roots.contains(root) {
                    config.library.expansion_roots.push(root.clone());
                }
                ctx.output
                    .println(&format!("Registered expansion library {}", root.display()));
            }
            ctx.save_config(&config)?;
        }

        if report.cancelled || !report.failed.is_empty() {
            ctx.output.warning(&report.summary());
        } else {
            ctx.output.success(&report.summary());
        }
        info!(
            installed = report.installed.len(),
            files = report.files_copied,
            cancelled = report.cancelled,
            "Install command finished"
        );
        Ok(())
    }
}

/// Expand folder arguments to the `.zip` archives directly inside them.
fn collect_archives(paths: &[PathBuf]) -> Result<Vec<PathBuf>, CliError> {
    let mut archives = Vec::new();
    for path in paths {
        if !path.is_dir() {
            archives.push(path.clone());
            continue;
        }
        let entries = fs::read_dir(path).map_err(|error| CliError::ReadPath {
            path: path.clone(),
            error,
        })?;
        let mut found: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "zip"))
            .collect();
        found.sort();
        archives.extend(found);
    }
    Ok(archives)
}

// ============================================================================
// Uninstall Handler
// ============================================================================

/// Handler for the `uninstall` command.
pub struct UninstallHandler;

impl CommandHandler for UninstallHandler {
    type Args = UninstallArgs;

    fn execute(args: Self::Args, ctx: &CommandContext<'_>) -> Result<(), CliError> {
        let config = ManagerConfig::from_config_file(ctx.config)?;
        let registry = Arc::new(InstalledVolumeRegistry::new());

        let root = match args.root {
            Some(root) => root,
            None => registry
                .find(&config.layout.all_roots(), &config.product, &args.volume)
                .map(|installed| installed.root)
                .ok_or_else(|| ManagerError::VolumeNotInstalled {
                    root: config.layout.default_root.clone(),
                    volume: args.volume.clone(),
                })?,
        };

        let prompt = format!("Uninstall {} from {}?", args.volume, root.display());
        if !args.force && !ctx.interaction.confirm(&prompt) {
            ctx.output.println("Uninstall aborted.");
            return Ok(());
        }

        let report = VolumeUninstaller::new(registry).uninstall(&root, &args.volume)?;
        ctx.output.success(&format!(
            "Uninstalled {}: {} file(s) removed, {} kept for other volumes",
            report.volume, report.files_removed, report.files_kept
        ));
        if report.files_missing > 0 {
            ctx.output.indented(&format!(
                "{} listed file(s) were already missing",
                report.files_missing
            ));
        }
        Ok(())
    }
}

// ============================================================================
// List Handler
// ============================================================================

/// Handler for the `list` command.
pub struct ListHandler;

impl CommandHandler for ListHandler {
    type Args = ListArgs;

    fn execute(args: Self::Args, ctx: &CommandContext<'_>) -> Result<(), CliError> {
        let config = ManagerConfig::from_config_file(ctx.config)?;
        let registry = InstalledVolumeRegistry::new();
        let installed = registry.installed_manifests(&config.layout.all_roots(), &config.product);

        if installed.is_empty() {
            ctx.output.println("No volumes installed.");
            return Ok(());
        }

        ctx.output.header(&format!("Installed volumes ({})", installed.len()));
        for volume in installed.iter() {
            ctx.output.println(volume.name());
            if args.verbose {
                ctx.output.indented(&format!("Library: {}", volume.root.display()));
                ctx.output.indented(&format!(
                    "Files:   {} ({})",
                    volume.manifest.total_files,
                    display_size(volume.manifest.uncompressed_size)
                ));
                ctx.output
                    .indented(&format!("Tier:    {}", volume.manifest.volume_info));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Check Handler
// ============================================================================

/// Handler for the `check` command.
pub struct CheckHandler;

impl CommandHandler for CheckHandler {
    type Args = CheckArgs;

    fn execute(args: Self::Args, ctx: &CommandContext<'_>) -> Result<(), CliError> {
        let source = catalog_source(&args, ctx)?;
        let config = ManagerConfig::from_config_file(ctx.config)?;

        ctx.output.println(&format!("Catalog: {}", source.location()));
        let catalog = source.fetch()?;
        let installed = InstalledVolumeRegistry::new()
            .list_installed(&config.layout.all_roots(), &config.product);
        let delta = compare_against_catalog(&installed, &catalog, &config.product);

        ctx.output.println(&format!(
            "{} volume(s) in catalog, {} installed",
            delta.catalog_count, delta.installed_count
        ));
        if delta.updates_available() {
            ctx.output.newline();
            ctx.output
                .header(&format!("Not installed ({})", delta.missing.len()));
            for volume in &delta.missing {
                ctx.output.indented(volume);
            }
        } else {
            ctx.output.success("All catalog volumes are installed");
        }
        Ok(())
    }
}

fn catalog_source(
    args: &CheckArgs,
    ctx: &CommandContext<'_>,
) -> Result<Box<dyn CatalogSource>, CliError> {
    if let Some(path) = &args.catalog {
        return Ok(Box::new(FileCatalogSource::new(path)));
    }

    let url = args
        .url
        .clone()
        .or_else(|| ctx.config.catalog.url.clone())
        .ok_or_else(|| {
            CliError::Config(
                "No catalog specified. Use --catalog or --url, or set url in config.ini [catalog] section."
                    .to_string(),
            )
        })?;
    let cache = ctx
        .config
        .catalog
        .cache_file
        .clone()
        .unwrap_or_else(|| config_directory().join(CATALOG_CACHE_FILE));
    Ok(Box::new(HttpCatalogSource::new(url)?.with_cache_file(cache)))
}

// ============================================================================
// Verify Handler
// ============================================================================

/// Handler for the `verify` command.
pub struct VerifyHandler;

impl CommandHandler for VerifyHandler {
    type Args = VerifyArgs;

    fn execute(args: Self::Args, ctx: &CommandContext<'_>) -> Result<(), CliError> {
        let config = ManagerConfig::from_config_file(ctx.config)?;
        let installed = InstalledVolumeRegistry::new()
            .installed_manifests(&config.layout.all_roots(), &config.product);

        let selected: Vec<_> = installed
            .iter()
            .filter(|v| args.volume.as_deref().map_or(true, |name| v.name() == name))
            .collect();
        if let (Some(volume), true) = (&args.volume, selected.is_empty()) {
            return Err(ManagerError::VolumeNotInstalled {
                root: config.layout.default_root.clone(),
                volume: volume.clone(),
            }
            .into());
        }

        let mut failed = 0usize;
        for volume in selected {
            let report = verify_volume(&volume.root, &volume.manifest)?;
            if report.is_ok() {
                ctx.output
                    .println(&format!("{}: OK ({} files)", report.volume, report.checked));
                continue;
            }
            failed += 1;
            ctx.output.error(&format!(
                "{}: {} missing, {} wrong size",
                report.volume,
                report.missing.len(),
                report.mismatched.len()
            ));
            for path in &report.missing {
                ctx.output.indented(&format!("missing: {}", path));
            }
            for (path, expected, actual) in &report.mismatched {
                ctx.output.indented(&format!(
                    "size:    {} (expected {}, found {})",
                    path, expected, actual
                ));
            }
        }

        if failed > 0 {
            return Err(CliError::VerifyFailed(failed));
        }
        Ok(())
    }
}

// ============================================================================
// Init Handler
// ============================================================================

/// Handler for the `init` command.
pub struct InitHandler;

impl CommandHandler for InitHandler {
    type Args = InitArgs;

    fn execute(args: Self::Args, ctx: &CommandContext<'_>) -> Result<(), CliError> {
        let path = std::path::absolute(&args.path).map_err(|error| CliError::ReadPath {
            path: args.path.clone(),
            error,
        })?;
        let product = args
            .product
            .clone()
            .unwrap_or_else(|| ctx.config.library.product.clone());
        let name = args.name.clone().unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Library".to_string())
        });
        let library_type = LibraryType::from(args.library_type);
        let info = LibraryInfo::new(product, library_type, name, args.version.clone());

        // Re-initialising a root in its own configured slot is allowed.
        let layout = ManagerConfig::from_config_file(ctx.config)
            .ok()
            .map(|config| config.layout);
        let same_slot = layout.as_ref().and_then(|l| l.kind_of(&path)) == Some(library_type);
        validate_new_root(
            &path,
            if same_slot { None } else { layout.as_ref() },
            ctx.config.library.install_dir.as_deref(),
        )?;

        let root = if args.convert {
            LibraryRoot::convert(&path, info)?
        } else {
            LibraryRoot::create(&path, info)?
        };

        let mut config = ctx.config.clone();
        match library_type {
            LibraryType::Default => config.library.default_root = Some(path.clone()),
            LibraryType::User => config.library.user_root = Some(path.clone()),
            LibraryType::Expansion => {
                if !config.library.expansion_roots.contains(&path) {
                    config.library.expansion_roots.push(path.clone());
                }
            }
        }
        if let Some(product) = args.product {
            config.library.product = product;
        }
        ctx.save_config(&config)?;

        ctx.output.success(&format!(
            "Created {} '{}' at {}",
            library_type,
            root.info().library_name,
            root.path().display()
        ));
        ctx.output
            .indented(&format!("Registered in {}", ctx.config_path.display()));
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
