//! On-disk cache of downloaded archives
//!
//! Entries live at `<root>/cache-<namespace>/<key>`. A present entry is
//! trusted as-is: there is no checksum revalidation and no eviction, entries
//! stay until something outside this tool removes them.

use crate::error::{CoatError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Cache namespace for the template scaffold
pub const TEMPLATE_NAMESPACE: &str = "template";

/// Cache namespace for platform binaries
pub const BINARY_NAMESPACE: &str = "dufflebin";

/// A single cache namespace
#[derive(Debug, Clone)]
pub struct ArchiveCache {
    namespace: String,
    directory: PathBuf,
}

impl ArchiveCache {
    pub fn new(root: &Path, namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            directory: root.join(format!("cache-{}", namespace)),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.directory.join(key)
    }

    pub async fn contains(&self, key: &str) -> bool {
        fs::try_exists(self.entry_path(key)).await.unwrap_or(false)
    }

    /// Copy a cached entry out to `destination`
    pub async fn copy_from_cache(&self, key: &str, destination: &Path) -> Result<()> {
        let entry = self.entry_path(key);
        if !self.contains(key).await {
            return Err(CoatError::NotFound {
                namespace: self.namespace.clone(),
                key: key.to_string(),
            });
        }
        fs::copy(&entry, destination).await.map_err(|e| {
            CoatError::io(
                format!(
                    "Failed to copy cached {} to {}",
                    entry.display(),
                    destination.display()
                ),
                e,
            )
        })?;
        Ok(())
    }

    /// Store `source` under `key`, creating the namespace directory if needed
    pub async fn copy_to_cache(&self, key: &str, source: &Path) -> Result<()> {
        fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| CoatError::io_at("create cache directory", &self.directory, e))?;

        let entry = self.entry_path(key);
        fs::copy(source, &entry).await.map_err(|e| {
            CoatError::io(
                format!("Failed to copy {} into cache as {}", source.display(), key),
                e,
            )
        })?;
        Ok(())
    }
}
