//! Confinement of client-supplied paths to the shared root.

use std::path::{Component, Path, PathBuf};

use crate::error::AppError;

/// The requested path would leave the shared root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("path escapes the shared root")]
pub struct PathTraversal;

impl From<PathTraversal> for AppError {
    fn from(_: PathTraversal) -> Self {
        AppError::PathTraversal
    }
}

/// Lexically resolve `requested` under `root`.
///
/// Leading `/` and `\` are stripped so URL-style paths stay root-relative.
/// `.` and `..` segments are folded the way a filesystem join would; the
/// result must still lie under `root`, otherwise `PathTraversal`.
/// Symlinks are not looked at here, see [`confine`].
pub fn resolve(root: &Path, requested: &str) -> Result<PathBuf, PathTraversal> {
    let trimmed = requested.trim_start_matches(['/', '\\']);
    let root = normalize(root);
    let joined = normalize(&root.join(trimmed));

    let rel = joined.strip_prefix(&root).map_err(|_| PathTraversal)?;
    match rel.components().next() {
        Some(Component::ParentDir | Component::RootDir | Component::Prefix(_)) => {
            Err(PathTraversal)
        }
        _ => Ok(joined),
    }
}

/// [`resolve`], then make sure an existing target does not reach outside
/// `root` through a symlink. `root` must already be canonical.
pub async fn confine(root: &Path, requested: &str) -> Result<PathBuf, AppError> {
    let lexical = resolve(root, requested)?;

    match tokio::fs::symlink_metadata(&lexical).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(lexical),
        Err(e) => return Err(AppError::Io(e)),
    }

    // Canonical guard: resolves symlinks and verifies containment.
    let canonical = match tokio::fs::canonicalize(&lexical).await {
        Ok(p) => p,
        // Dangling symlink: nothing to serve behind it.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(AppError::NotFound),
        Err(e) => return Err(AppError::Io(e)),
    };
    if !canonical.starts_with(root) {
        tracing::warn!(
            requested,
            target = %canonical.display(),
            "symlink points outside the shared root"
        );
        return Err(AppError::PathTraversal);
    }
    Ok(lexical)
}

/// Relative URL form (`a/b/c`) of a confined path.
pub fn relative_url(root: &Path, confined: &Path) -> String {
    let rel = confined.strip_prefix(root).unwrap_or(confined);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping past the filesystem root is a no-op, as with `cd /..`.
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
