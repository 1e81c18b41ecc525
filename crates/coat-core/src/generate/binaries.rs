//! Per-platform installer binaries
//!
//! One tarball per platform is downloaded (through the binary cache) and
//! unpacked into `dufflebin/`. All platforms are fetched concurrently; the
//! join waits for every task and reports the first failure in platform
//! order, not completion order.

use crate::cache::ArchiveCache;
use crate::error::{CoatError, Result};
use crate::fetch::{ArchiveFormat, CacheSlot, Fetcher, ProgressThrottle};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use url::Url;

/// Directory under the project that receives platform binaries
pub const BINARY_DIR: &str = "dufflebin";

/// Platforms a generated installer ships binaries for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    Darwin,
    Linux,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Windows, Platform::Darwin, Platform::Linux];

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Darwin => "darwin",
            Platform::Linux => "linux",
        }
    }

    /// Cache key; includes the version so new releases never hit stale entries
    pub fn cache_key(&self, version: &str) -> String {
        let version: String = version
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        format!("duffle-{}-{}.tgz", self.name(), version)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything one platform fetch needs, owned so it can run on its own task
#[derive(Debug, Clone)]
pub struct BinaryJob {
    pub platform: Platform,
    pub url: Url,
    pub cache_key: String,
    pub destination: PathBuf,
}

/// Download and unpack one platform's binary, sending throttled progress
pub async fn fetch_binary(
    fetcher: Fetcher,
    cache: ArchiveCache,
    job: BinaryJob,
    progress: UnboundedSender<String>,
) -> Result<Platform> {
    let platform = job.platform;
    let mut throttle = ProgressThrottle::per_second(|mb| {
        // The receiver only goes away once the run is over
        let _ = progress.send(format!("Downloading {} binary: {:.1} MB", platform, mb));
    });
    let mut on_chunk = |bytes: u64| throttle.record(bytes);

    fetcher
        .download_archive(
            &job.url,
            ArchiveFormat::TarGz,
            &job.destination,
            Some(CacheSlot {
                cache: &cache,
                key: &job.cache_key,
            }),
            Some(&mut on_chunk),
        )
        .await?;

    tracing::debug!(%platform, "binary ready");
    Ok(platform)
}

/// Wait for every task, then return all successes or the first failure by index
pub async fn join_in_order<T>(handles: Vec<JoinHandle<Result<T>>>) -> Result<Vec<T>> {
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let result = handle.await.unwrap_or_else(|e| {
            Err(CoatError::Tool {
                tool: "platform fetch".to_string(),
                message: e.to_string(),
            })
        });
        results.push(result);
    }
    results.into_iter().collect()
}
