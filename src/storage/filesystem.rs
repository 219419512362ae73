use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{MirrorError, MirrorResult};

/// Trait for the place mirrored files are written to
#[async_trait]
pub trait MirrorStorage: Send + Sync {
    /// Create the mirror root; failure here is fatal to the run
    async fn prepare(&self) -> MirrorResult<()>;

    /// Whether a file already exists at a mirror-relative path
    async fn exists(&self, relative: &Path) -> bool;

    /// Write a file, creating its directories, and return its full path
    async fn store(
        &self,
        relative_dir: &Path,
        filename: &str,
        content: &[u8],
    ) -> MirrorResult<PathBuf>;
}

/// Local directory implementation of MirrorStorage
pub struct FilesystemStorage {
    /// Mirror root directory
    root: PathBuf,
}

impl FilesystemStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl MirrorStorage for FilesystemStorage {
    async fn prepare(&self) -> MirrorResult<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| MirrorError::filesystem(&self.root, &e))
    }

    async fn exists(&self, relative: &Path) -> bool {
        matches!(fs::try_exists(self.root.join(relative)).await, Ok(true))
    }

    async fn store(
        &self,
        relative_dir: &Path,
        filename: &str,
        content: &[u8],
    ) -> MirrorResult<PathBuf> {
        let dir = self.root.join(relative_dir);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| MirrorError::filesystem(&dir, &e))?;

        let path = dir.join(filename);
        fs::write(&path, content)
            .await
            .map_err(|e| MirrorError::filesystem(&path, &e))?;

        Ok(path)
    }
}
