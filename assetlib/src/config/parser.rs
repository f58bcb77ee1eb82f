//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;

/// Key prefix for numbered expansion library roots (`expansion_root_1`, ...).
pub(super) const EXPANSION_KEY_PREFIX: &str = "expansion_root_";

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [library] section
    if let Some(section) = ini.section(Some("library")) {
        if let Some(v) = section.get("product") {
            let v = v.trim();
            if v.is_empty() {
                return Err(invalid("library", "product", v, "must not be empty"));
            }
            config.library.product = v.to_string();
        }
        config.library.default_root = section.get("default_root").and_then(non_empty_path);
        config.library.user_root = section.get("user_root").and_then(non_empty_path);
        config.library.install_dir = section.get("install_dir").and_then(non_empty_path);

        let mut expansions: Vec<(u32, PathBuf)> = Vec::new();
        for (key, value) in section.iter() {
            let Some(index) = key.strip_prefix(EXPANSION_KEY_PREFIX) else {
                continue;
            };
            let index: u32 = index.parse().map_err(|_| {
                invalid("library", key, value, "expansion keys must end in a number")
            })?;
            if let Some(path) = non_empty_path(value) {
                expansions.push((index, path));
            }
        }
        expansions.sort_by_key(|(index, _)| *index);
        config.library.expansion_roots = expansions.into_iter().map(|(_, p)| p).collect();
    }

    // [install] section
    if let Some(section) = ini.section(Some("install")) {
        if let Some(v) = section.get("overwrite") {
            config.install.overwrite = parse_bool("install", "overwrite", v)?;
        }
        if let Some(v) = section.get("keep_archives") {
            config.install.keep_archives = parse_bool("install", "keep_archives", v)?;
        }
    }

    // [packer] section
    if let Some(section) = ini.section(Some("packer")) {
        if let Some(v) = section.get("max_volume_size") {
            let size = parse_size(v).map_err(|_| {
                invalid(
                    "packer",
                    "max_volume_size",
                    v,
                    "expected format like '2GB', '500MB', or '1024KB'",
                )
            })?;
            if size == 0 {
                return Err(invalid("packer", "max_volume_size", v, "must be positive"));
            }
            config.packer.max_volume_size = size;
        }
        if let Some(v) = section.get("ignore_tier") {
            config.packer.ignore_tier = parse_bool("packer", "ignore_tier", v)?;
        }
        if let Some(v) = section.get("threads") {
            config.packer.threads = v.trim().parse().map_err(|_| {
                invalid("packer", "threads", v, "must be a non-negative integer")
            })?;
        }
    }

    // [catalog] section
    if let Some(section) = ini.section(Some("catalog")) {
        config.catalog.url = section
            .get("url")
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        config.catalog.cache_file = section.get("cache_file").and_then(non_empty_path);
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(path) = section.get("directory").and_then(non_empty_path) {
            config.logging.directory = path;
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(invalid(section, key, value, "must be 'true' or 'false'")),
    }
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    let value = value.trim();
    (!value.is_empty()).then(|| expand_tilde(value))
}

/// Expand a leading `~/` to the user's home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_expansions_are_ordered_by_index() {
        let config = parse(
            "[library]\nexpansion_root_2 = /b\nexpansion_root_1 = /a\nexpansion_root_10 = /c\n",
        )
        .unwrap();

        assert_eq!(
            config.library.expansion_roots,
            vec![PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/c")]
        );
    }

    #[test]
    fn test_invalid_bool() {
        let err = parse("[install]\noverwrite = maybe\n").unwrap_err();
        assert!(err.to_string().contains("install.overwrite"));
    }

    #[test]
    fn test_invalid_volume_size() {
        assert!(parse("[packer]\nmax_volume_size = lots\n").is_err());
        assert!(parse("[packer]\nmax_volume_size = 0\n").is_err());
    }

    #[test]
    fn test_empty_values_are_none() {
        let config = parse("[library]\ndefault_root =\n[catalog]\nurl =\n").unwrap();
        assert!(config.library.default_root.is_none());
        assert!(config.catalog.url.is_none());
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/libraries");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("libraries"));
        }
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }
}
