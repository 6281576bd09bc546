//! Directory listing records and breadcrumbs.

use std::{io, path::Path};

use crate::config::Config;

/// Name of the server executable, hidden from listings on every platform.
pub const BIN_NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    /// Path relative to the root, `/`-separated, used in links.
    pub path: String,
    /// Human-readable size, or `"directory"`.
    pub size: String,
    pub is_dir: bool,
    /// Whether the delete control is rendered.
    pub is_admin: bool,
}

/// What the filesystem told us about one directory entry.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub name: String,
    pub len: u64,
    pub is_dir: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    pub name: String,
    /// Relative path; empty for the root.
    pub path: String,
}

pub fn excluded_names(config_path: &Path) -> Vec<String> {
    vec![
        Config::file_name(config_path),
        BIN_NAME.to_string(),
        format!("{BIN_NAME}.exe"),
    ]
}

/// Binary (1024-based) units, one decimal above bytes.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

/// Shape raw entries into display records.
///
/// Excluded names are dropped; directories come first, then files, both
/// sorted by name.
pub fn format(
    entries: impl IntoIterator<Item = RawEntry>,
    prefix: &str,
    is_admin: bool,
    excluded: &[String],
) -> Vec<FileEntry> {
    let prefix = prefix.trim_matches('/');
    let mut out: Vec<FileEntry> = entries
        .into_iter()
        .filter(|e| !excluded.iter().any(|x| *x == e.name))
        .map(|e| FileEntry {
            path: if prefix.is_empty() {
                e.name.clone()
            } else {
                format!("{prefix}/{}", e.name)
            },
            size: if e.is_dir {
                "directory".to_string()
            } else {
                format_size(e.len)
            },
            is_dir: e.is_dir,
            is_admin,
            name: e.name,
        })
        .collect();

    out.sort_unstable_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
    out
}

/// Read `dir` and format its entries. Entries that cannot be stat'ed are
/// skipped rather than failing the whole listing, and so are symlinks
/// that resolve outside `root`.
pub async fn read_listing(
    dir: &Path,
    root: &Path,
    prefix: &str,
    is_admin: bool,
    excluded: &[String],
) -> io::Result<Vec<FileEntry>> {
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    let mut raw = Vec::new();

    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        let entry_path = entry.path();
        if !link_stays_inside(&entry_path, root).await {
            continue;
        }
        let meta = match tokio::fs::metadata(&entry_path).await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Cannot stat {}: {}", entry_path.display(), e);
                continue;
            }
        };
        raw.push(RawEntry {
            name,
            len: meta.len(),
            is_dir: meta.is_dir(),
        });
    }

    Ok(format(raw, prefix, is_admin, excluded))
}

/// False for a symlink whose target is outside `root`. Dangling links
/// pass here and are dropped by the stat that follows.
async fn link_stays_inside(path: &Path, root: &Path) -> bool {
    let is_link = tokio::fs::symlink_metadata(path)
        .await
        .is_ok_and(|m| m.file_type().is_symlink());
    if !is_link {
        return true;
    }
    match tokio::fs::canonicalize(path).await {
        Ok(real) if !real.starts_with(root) => {
            tracing::debug!("not listing {}: points outside the root", path.display());
            false
        }
        _ => true,
    }
}

/// Breadcrumbs for a relative directory path, always starting at "Home".
pub fn breadcrumbs(path: &str) -> Vec<Breadcrumb> {
    let mut crumbs = vec![Breadcrumb {
        name: "Home".to_string(),
        path: String::new(),
    }];

    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        crumbs.push(Breadcrumb {
            name: segment.to_string(),
            path: current.clone(),
        });
    }
    crumbs
}
