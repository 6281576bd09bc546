use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{config::Config, listing};

#[derive(Clone)]
pub struct AppState {
    /// Read-only for the lifetime of the process.
    pub config: Arc<Config>,
    /// Canonicalized (symlink-resolved) `config.root_dir`.
    /// Every client-supplied path is confined to it.
    pub root: PathBuf,
    /// File names never shown in listings.
    pub excluded: Arc<[String]>,
}

impl AppState {
    /// Create the root directory if needed and canonicalize it.
    pub async fn new(config: Config, config_path: &Path) -> io::Result<Self> {
        if !tokio::fs::try_exists(&config.root_dir).await.unwrap_or(false) {
            tracing::warn!(
                "root directory does not exist yet, creating {}",
                config.root_dir.display()
            );
            tokio::fs::create_dir_all(&config.root_dir).await?;
        }
        let root = tokio::fs::canonicalize(&config.root_dir).await?;
        let excluded = listing::excluded_names(config_path).into();

        Ok(Self {
            config: Arc::new(config),
            root,
            excluded,
        })
    }

    /// Whether `path` names one of the server's own control files.
    pub fn is_hidden(&self, path: &Path) -> bool {
        path.file_name()
            .map(|n| n.to_string_lossy())
            .is_some_and(|n| self.excluded.iter().any(|x| *x == n))
    }
}
