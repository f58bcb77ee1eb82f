//! Path state checks run before any install or conversion mutates disk.

use std::fs;
use std::path::{Path, PathBuf};

use super::config::LibraryLayout;
use super::error::{ManagerError, ManagerResult};

/// Canonical form of a path, resolving through its nearest existing ancestor.
fn comparable(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            comparable(parent).join(name)
        }
        _ => path.to_path_buf(),
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    comparable(a) == comparable(b)
}

fn is_within(path: &Path, dir: &Path) -> bool {
    comparable(path).starts_with(comparable(dir))
}

/// Check that the configured library roots can be used.
///
/// # Errors
///
/// Returns [`ManagerError::InvalidState`] if the user library equals the
/// default library, an expansion root repeats another root, or any root is
/// inside the host installation directory.
pub fn validate_layout(layout: &LibraryLayout, install_dir: Option<&Path>) -> ManagerResult<()> {
    if let Some(user) = &layout.user_root {
        if same_path(user, &layout.default_root) {
            return Err(ManagerError::InvalidState(format!(
                "user library path equals default library path ({})",
                user.display()
            )));
        }
    }

    for expansion in &layout.expansion_roots {
        let clashes = same_path(expansion, &layout.default_root)
            || layout
                .user_root
                .as_deref()
                .is_some_and(|user| same_path(expansion, user));
        if clashes {
            return Err(ManagerError::InvalidState(format!(
                "expansion library {} is also configured as the default or user library",
                expansion.display()
            )));
        }
    }

    for root in layout.all_roots() {
        validate_destination(&root, install_dir)?;
    }
    Ok(())
}

/// Check that a library root is not inside the host installation directory.
pub fn validate_destination(root: &Path, install_dir: Option<&Path>) -> ManagerResult<()> {
    if let Some(install_dir) = install_dir {
        if is_within(root, install_dir) {
            return Err(ManagerError::InvalidState(format!(
                "library {} is inside the installation directory {}",
                root.display(),
                install_dir.display()
            )));
        }
    }
    Ok(())
}

/// Check that `destination` is neither `source` nor inside it.
pub fn validate_distinct(source: &Path, destination: &Path) -> ManagerResult<()> {
    if is_within(destination, source) {
        return Err(ManagerError::InvalidState(format!(
            "destination {} is the same as or inside source {}",
            destination.display(),
            source.display()
        )));
    }
    Ok(())
}

/// Check that a folder may become a new library root.
pub fn validate_new_root(
    path: &Path,
    layout: Option<&LibraryLayout>,
    install_dir: Option<&Path>,
) -> ManagerResult<()> {
    validate_destination(path, install_dir)?;
    if let Some(layout) = layout {
        if let Some(existing) = layout.all_roots().iter().find(|r| same_path(r, path)) {
            return Err(ManagerError::InvalidState(format!(
                "{} is already a configured library",
                existing.display()
            )));
        }
    }
    Ok(())
}
