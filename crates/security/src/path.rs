//! Path validation: confines workspace-relative paths to the workspace root.
//!
//! Every path a tool hands to the local file store goes through
//! `resolve_in_workspace` first, so a model cannot read or write outside the
//! project directory or into forbidden subtrees such as `.git`.

use std::path::{Component, Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathValidationError {
    #[error("path is empty")]
    Empty,

    #[error("absolute paths are not allowed: '{path}'")]
    Absolute { path: String },

    #[error("path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("'{path}' is inside forbidden path '{pattern}'")]
    ForbiddenPath { path: String, pattern: String },

    #[error("'{path}' resolves outside the workspace")]
    OutsideWorkspace { path: String },

    #[error("failed to canonicalize '{path}': {reason}")]
    CanonicalizeFailed { path: String, reason: String },
}

/// Normalize a workspace-relative path to forward-slash form without `.`
/// components. `""` and `"."` both denote the workspace root.
pub fn normalize_relative(path: &str) -> Result<String, PathValidationError> {
    let unified = path.replace('\\', "/");
    let trimmed = unified.trim();

    if trimmed.starts_with('/') || Path::new(trimmed).is_absolute() {
        return Err(PathValidationError::Absolute { path: path.into() });
    }

    let mut parts = Vec::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(PathValidationError::PathTraversal { path: path.into() });
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathValidationError::Absolute { path: path.into() });
            }
        }
    }
    Ok(parts.join("/"))
}

/// Validate `path` against the workspace and return the absolute path to use.
///
/// Checks:
/// 1. No absolute paths and no `..` components
/// 2. Not inside any forbidden path (matched per component prefix, e.g. `.git`)
/// 3. The deepest existing ancestor canonicalizes to somewhere under `root`,
///    which catches symlinks pointing out of the workspace
///
/// The target itself need not exist yet (writes create it).
pub fn resolve_in_workspace(
    root: &Path,
    path: &str,
    forbidden_paths: &[String],
) -> Result<PathBuf, PathValidationError> {
    let relative = normalize_relative(path)?;

    for forbidden in forbidden_paths {
        let pattern = normalize_relative(forbidden).unwrap_or_else(|_| forbidden.clone());
        if pattern.is_empty() {
            continue;
        }
        if relative == pattern || relative.starts_with(&format!("{pattern}/")) {
            return Err(PathValidationError::ForbiddenPath {
                path: path.into(),
                pattern: forbidden.clone(),
            });
        }
    }

    let canonical_root = root
        .canonicalize()
        .map_err(|e| PathValidationError::CanonicalizeFailed {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;

    let joined = if relative.is_empty() {
        canonical_root.clone()
    } else {
        canonical_root.join(&relative)
    };

    // Walk up to the deepest ancestor that exists and make sure it stays inside.
    let mut probe = joined.as_path();
    while !probe.exists() {
        match probe.parent() {
            Some(parent) => probe = parent,
            None => break,
        }
    }
    let resolved = probe
        .canonicalize()
        .map_err(|e| PathValidationError::CanonicalizeFailed {
            path: path.into(),
            reason: e.to_string(),
        })?;
    if !resolved.starts_with(&canonical_root) {
        return Err(PathValidationError::OutsideWorkspace { path: path.into() });
    }

    Ok(joined)
}
