//! Generator configuration
//!
//! Everything the generator would otherwise read from process-wide state
//! (storage location, OS user, download sources) is collected here and
//! injected at construction.

use crate::error::{CoatError, Result};
use std::path::PathBuf;
use url::Url;

/// Default archive for the self-installer template scaffold
pub const DEFAULT_TEMPLATE_URL: &str =
    "https://github.com/deislabs/duffle-bag/releases/download/latest/duffle-bag.zip";

/// Base URL that per-platform duffle tarballs are published under
pub const DEFAULT_BINARY_URL_BASE: &str = "https://github.com/deislabs/duffle/releases/download";

/// Release tag of the duffle binaries embedded in generated installers
pub const DEFAULT_BINARY_VERSION: &str = "0.1.0-ralpha.5+englishrose";

/// Environment variable overriding the template URL
pub const TEMPLATE_URL_ENV: &str = "DUFFLE_COAT_TEMPLATE_URL";

/// Environment variable overriding the binary base URL
pub const BINARY_URL_ENV: &str = "DUFFLE_COAT_BINARY_URL";

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "DUFFLE_COAT_CACHE_DIR";

/// Environment variable overriding the bundle tool executable
pub const TOOL_ENV: &str = "DUFFLE_COAT_TOOL";

const STORAGE_DIR_NAME: &str = ".duffle-coat";
const UNKNOWN_USER: &str = "unknown";

/// Configuration for one generator instance
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Base storage directory; caches live in `cache-<namespace>` below it
    pub cache_root: PathBuf,

    /// OS user recorded as author of generated projects
    pub current_user_name: String,

    /// Zip archive holding the template scaffold
    pub template_url: Url,

    /// Base URL for platform binaries
    pub binary_url_base: Url,

    /// Release tag of the platform binaries
    pub binary_version: String,

    /// Duffle home directory holding locally recorded bundles
    pub duffle_home: PathBuf,

    /// Bundle tool executable used for full payload export
    pub duffle_tool: String,

    /// User agent string for HTTP requests
    pub user_agent: String,
}

impl GeneratorConfig {
    /// Build a configuration from defaults, honouring environment overrides
    pub fn from_env() -> Result<Self> {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));

        let cache_root = std::env::var_os(CACHE_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(STORAGE_DIR_NAME));

        let duffle_home = std::env::var_os("DUFFLE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".duffle"));

        let template_url = env_url(TEMPLATE_URL_ENV, DEFAULT_TEMPLATE_URL)?;
        let binary_url_base = env_url(BINARY_URL_ENV, DEFAULT_BINARY_URL_BASE)?;

        Ok(Self {
            cache_root,
            current_user_name: current_user_name(),
            template_url,
            binary_url_base,
            binary_version: DEFAULT_BINARY_VERSION.to_string(),
            duffle_home,
            duffle_tool: std::env::var(TOOL_ENV).unwrap_or_else(|_| "duffle".to_string()),
            user_agent: concat!("duffle-coat/", env!("CARGO_PKG_VERSION")).to_string(),
        })
    }

    /// URL of the tarball for one platform's binary
    pub fn binary_url(&self, platform_name: &str) -> Result<Url> {
        let mut url = self.binary_url_base.clone();
        url.path_segments_mut()
            .map_err(|_| CoatError::parse("binary URL", format!("{} cannot be a base", self.binary_url_base)))?
            .pop_if_empty()
            .push(&self.binary_version)
            .push(&format!("duffle-{}-amd64.tgz", platform_name));
        Ok(url)
    }
}

fn env_url(var: &str, default: &str) -> Result<Url> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| CoatError::parse(format!("{} ({})", var, raw), e))
}

/// The OS user from `USERNAME` or `USER`, or `"unknown"`
pub fn current_user_name() -> String {
    user_name_from(std::env::var("USERNAME").ok(), std::env::var("USER").ok())
}

fn user_name_from(username: Option<String>, user: Option<String>) -> String {
    username
        .filter(|s| !s.is_empty())
        .or(user.filter(|s| !s.is_empty()))
        .unwrap_or_else(|| UNKNOWN_USER.to_string())
}
