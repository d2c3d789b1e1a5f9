pub mod git;

use std::path::{Component, Path, PathBuf};

use crate::error::{AppError, Result};

/// Resolve `requested` against `root` and make sure it stays inside.
///
/// Paths that don't exist yet are checked through their nearest existing
/// ancestor, so nothing is created on disk here.
pub fn verify_path(root: &Path, requested: &Path) -> Result<PathBuf> {
    if requested.is_absolute() {
        return Err(AppError::Workspace(format!(
            "Absolute paths are not allowed: {}",
            requested.display()
        )));
    }

    let canonical_root = root
        .canonicalize()
        .map_err(|e| AppError::Workspace(format!("Failed to resolve project root: {e}")))?;

    let full_path = canonical_root.join(requested);
    let mut existing = full_path.as_path();
    let mut missing: Vec<&std::ffi::OsStr> = Vec::new();
    while !existing.exists() {
        let name = existing
            .file_name()
            .ok_or_else(|| AppError::Workspace("Invalid file path".to_string()))?;
        missing.push(name);
        existing = existing
            .parent()
            .ok_or_else(|| AppError::Workspace("Invalid file path".to_string()))?;
    }

    let mut resolved = existing
        .canonicalize()
        .map_err(|e| AppError::Workspace(format!("Failed to resolve path: {e}")))?;
    for name in missing.into_iter().rev() {
        resolved.push(name);
    }

    let escapes = resolved
        .components()
        .any(|c| matches!(c, Component::ParentDir));
    if escapes || !resolved.starts_with(&canonical_root) {
        return Err(AppError::Workspace(format!(
            "Path traversal detected: {} is outside the project",
            requested.display()
        )));
    }

    Ok(resolved)
}
