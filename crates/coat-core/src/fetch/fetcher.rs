//! Streaming downloads with optional caching
//!
//! URLs may be remote (`http`/`https`) or local (`file://`). Local sources
//! behave exactly like remote ones apart from transport, which keeps
//! development against unpublished templates identical to production.

use super::extract::ArchiveFormat;
use crate::cache::ArchiveCache;
use crate::error::{CoatError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Callback receiving the byte count of every downloaded chunk
pub type OnProgress<'a> = Option<&'a mut (dyn FnMut(u64) + Send)>;

/// A cache namespace plus the key an artifact is stored under
#[derive(Debug, Clone, Copy)]
pub struct CacheSlot<'a> {
    pub cache: &'a ArchiveCache,
    pub key: &'a str,
}

/// Downloads artifacts and unpacks archives
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Create a new fetcher with a custom user agent
    pub fn new(user_agent: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(user_agent)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Stream `url` into `destination`, reporting each chunk's size
    pub async fn download(
        &self,
        url: &Url,
        destination: &Path,
        on_progress: OnProgress<'_>,
    ) -> Result<()> {
        if url.scheme() == "file" {
            return copy_local(url, destination, on_progress).await;
        }

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| CoatError::network(url, e))?;

        if !response.status().is_success() {
            return Err(CoatError::network(
                url,
                format!("HTTP {}", response.status()),
            ));
        }

        let mut file = fs::File::create(destination)
            .await
            .map_err(|e| CoatError::io_at("create", destination, e))?;

        let mut on_progress = on_progress;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| CoatError::network(url, e))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| CoatError::io_at("write", destination, e))?;
            if let Some(report) = on_progress.as_deref_mut() {
                report(chunk.len() as u64);
            }
        }

        file.flush()
            .await
            .map_err(|e| CoatError::io_at("write", destination, e))?;
        Ok(())
    }

    /// Fetch a small text document such as a repository manifest
    pub async fn fetch_text(&self, url: &Url) -> Result<String> {
        if url.scheme() == "file" {
            let path = local_path(url)?;
            return fs::read_to_string(&path)
                .await
                .map_err(|e| CoatError::io_at("read", &path, e));
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| CoatError::network(url, e))?;

        if !response.status().is_success() {
            return Err(CoatError::network(
                url,
                format!("HTTP {}", response.status()),
            ));
        }

        response.text().await.map_err(|e| CoatError::network(url, e))
    }

    /// Serve `destination` from the cache when possible, otherwise download it.
    ///
    /// Cache failures never fail the call: a broken cache read falls back to
    /// the network, and writing a fresh download back into the cache is
    /// fire-and-forget (logged, never returned).
    pub async fn download_with_cache(
        &self,
        slot: CacheSlot<'_>,
        url: &Url,
        destination: &Path,
        on_progress: OnProgress<'_>,
    ) -> Result<()> {
        let CacheSlot { cache, key } = slot;

        if cache.contains(key).await {
            match cache.copy_from_cache(key, destination).await {
                Ok(()) => {
                    tracing::debug!(namespace = cache.namespace(), key, "cache hit");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        namespace = cache.namespace(),
                        key,
                        error = %e,
                        "cache read failed, downloading instead"
                    );
                }
            }
        } else {
            tracing::debug!(namespace = cache.namespace(), key, "cache miss");
        }

        self.download(url, destination, on_progress).await?;

        if let Err(e) = cache.copy_to_cache(key, destination).await {
            tracing::warn!(
                namespace = cache.namespace(),
                key,
                error = %e,
                "could not store download in cache"
            );
        }

        Ok(())
    }

    /// Download an archive to a temporary file and unpack it into `destination`
    pub async fn download_archive(
        &self,
        url: &Url,
        format: ArchiveFormat,
        destination: &Path,
        cache: Option<CacheSlot<'_>>,
        on_progress: OnProgress<'_>,
    ) -> Result<()> {
        let temp = tempfile::Builder::new()
            .prefix("duffle-coat-")
            .suffix(&format!(".{}", format.extension()))
            .tempfile()
            .map_err(|e| CoatError::io("Failed to create temporary download file", e))?;
        let archive_path = temp.path().to_path_buf();

        match cache {
            Some(slot) => {
                self.download_with_cache(slot, url, &archive_path, on_progress)
                    .await?
            }
            None => self.download(url, &archive_path, on_progress).await?,
        }

        let destination_owned = destination.to_path_buf();
        let extracted = tokio::task::spawn_blocking(move || {
            format.extract(&archive_path, &destination_owned)
        })
        .await
        .map_err(|e| CoatError::Extract {
            archive: url.to_string(),
            destination: destination.to_path_buf(),
            message: e.to_string(),
        })?;
        extracted?;

        temp.close()
            .map_err(|e| CoatError::io("Failed to remove temporary download file", e))?;
        Ok(())
    }

    /// Download a zip archive and extract it into `destination`
    pub async fn download_zip(&self, url: &Url, destination: &Path) -> Result<()> {
        self.download_archive(url, ArchiveFormat::Zip, destination, None, None)
            .await
    }

    /// Download a gzip-compressed tar archive and extract it into `destination`
    pub async fn download_tar(&self, url: &Url, destination: &Path) -> Result<()> {
        self.download_archive(url, ArchiveFormat::TarGz, destination, None, None)
            .await
    }
}

fn local_path(url: &Url) -> Result<PathBuf> {
    url.to_file_path()
        .map_err(|_| CoatError::network(url, "not a valid local file URL"))
}

async fn copy_local(url: &Url, destination: &Path, on_progress: OnProgress<'_>) -> Result<()> {
    let source = local_path(url)?;
    let copied = fs::copy(&source, destination)
        .await
        .map_err(|e| CoatError::network(url, e))?;
    if let Some(report) = on_progress {
        report(copied);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BINARY_NAMESPACE;
    use crate::fetch::extract::test_archives::{tar_gz_bytes, zip_bytes};

    fn file_url(path: &Path) -> Url {
        Url::from_file_path(path).unwrap()
    }

    #[tokio::test]
    async fn test_download_local_file_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.bin");
        std::fs::write(&source, vec![7u8; 4096]).unwrap();

        let mut seen = 0u64;
        let mut report = |n: u64| seen += n;
        Fetcher::new("test")
            .download(&file_url(&source), &dir.path().join("dst.bin"), Some(&mut report))
            .await
            .unwrap();

        assert_eq!(seen, 4096);
        assert_eq!(std::fs::read(dir.path().join("dst.bin")).unwrap().len(), 4096);
    }

    #[tokio::test]
    async fn test_missing_source_is_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Fetcher::new("test")
            .download(
                &file_url(&dir.path().join("absent")),
                &dir.path().join("dst"),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoatError::Network { .. }));
    }

    #[tokio::test]
    async fn test_download_with_cache_populates_then_serves_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArchiveCache::new(&dir.path().join("store"), BINARY_NAMESPACE);
        let source = dir.path().join("remote.tgz");
        std::fs::write(&source, b"v1").unwrap();
        let fetcher = Fetcher::new("test");
        let slot = CacheSlot {
            cache: &cache,
            key: "linux.tgz",
        };

        let first = dir.path().join("first");
        fetcher
            .download_with_cache(slot, &file_url(&source), &first, None)
            .await
            .unwrap();
        assert!(cache.contains("linux.tgz").await);

        // The cached copy wins even after the source changes
        std::fs::write(&source, b"v2").unwrap();
        let second = dir.path().join("second");
        fetcher
            .download_with_cache(slot, &file_url(&source), &second, None)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&second).unwrap(), b"v1");
    }

    #[tokio::test]
    async fn test_broken_cache_entry_falls_back_to_network() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArchiveCache::new(&dir.path().join("store"), BINARY_NAMESPACE);
        // A directory under the key makes `contains` true but the copy fail
        std::fs::create_dir_all(cache.directory().join("linux.tgz").join("nested")).unwrap();
        assert!(cache.contains("linux.tgz").await);

        let source = dir.path().join("remote.tgz");
        std::fs::write(&source, b"fresh").unwrap();
        let dest = dir.path().join("dest");

        Fetcher::new("test")
            .download_with_cache(
                CacheSlot {
                    cache: &cache,
                    key: "linux.tgz",
                },
                &file_url(&source),
                &dest,
                None,
            )
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn test_download_zip_extracts_into_new_folder() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("template.zip");
        std::fs::write(&archive, zip_bytes(&[("app/package.json", &b"{}"[..])])).unwrap();

        let dest = dir.path().join("project");
        Fetcher::new("test")
            .download_zip(&file_url(&archive), &dest)
            .await
            .unwrap();
        assert!(dest.join("app/package.json").exists());
    }

    #[tokio::test]
    async fn test_download_tar_extracts() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bin.tgz");
        std::fs::write(&archive, tar_gz_bytes(&[("duffle-linux", &b"bin"[..])])).unwrap();

        let dest = dir.path().join("dufflebin");
        Fetcher::new("test")
            .download_tar(&file_url(&archive), &dest)
            .await
            .unwrap();
        assert_eq!(std::fs::read(dest.join("duffle-linux")).unwrap(), b"bin");
    }

    #[tokio::test]
    async fn test_download_zip_surfaces_download_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = Fetcher::new("test")
            .download_zip(&file_url(&dir.path().join("nope.zip")), &dir.path().join("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoatError::Network { .. }));
        assert!(!dir.path().join("p").exists());
    }
}
