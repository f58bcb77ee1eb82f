//! INI serialization logic for converting `ConfigFile` → INI string.

use std::fmt::Write;
use std::path::Path;

use super::parser::EXPANSION_KEY_PREFIX;
use super::settings::ConfigFile;
use super::size::format_size;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let default_root = opt_path(config.library.default_root.as_deref());
    let user_root = opt_path(config.library.user_root.as_deref());
    let install_dir = opt_path(config.library.install_dir.as_deref());
    let catalog_url = config.catalog.url.as_deref().unwrap_or("");
    let cache_file = opt_path(config.catalog.cache_file.as_deref());

    let mut expansions = String::new();
    for (i, root) in config.library.expansion_roots.iter().enumerate() {
        // Writing to a String cannot fail.
        let _ = writeln!(
            expansions,
            "{}{} = {}",
            EXPANSION_KEY_PREFIX,
            i + 1,
            path_to_string(root)
        );
    }

    format!(
        r#"[library]
; Product name; only volumes built for this product are installed
product = {}
; Root of the default library
default_root = {}
; Root of the user library (must differ from default_root)
user_root = {}
; Directory the host application is installed in; libraries may not live inside it
install_dir = {}
; Expansion library roots (expansion_root_1, expansion_root_2, ...)
{}
[install]
; Re-extract files that already exist with the expected size
overwrite = {}
; Keep archives after a successful install
keep_archives = {}

[packer]
; Maximum estimated compressed size of a volume (e.g., 500MB, 2GB)
max_volume_size = {}
; Pack all tiers into a single running bucket
ignore_tier = {}
; Worker threads for packing (0 = one per CPU core)
threads = {}

[catalog]
; URL of the online volumes catalog (JSON)
url = {}
; Local copy of the last fetched catalog
cache_file = {}

[logging]
directory = {}
file = {}
"#,
        config.library.product,
        default_root,
        user_root,
        install_dir,
        expansions,
        config.install.overwrite,
        config.install.keep_archives,
        format_size(config.packer.max_volume_size),
        config.packer.ignore_tier,
        config.packer.threads,
        catalog_url,
        cache_file,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

fn opt_path(path: Option<&Path>) -> String {
    path.map(path_to_string).unwrap_or_default()
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
