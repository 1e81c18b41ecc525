//! Bundle selection: where a bundle comes from and how to read it

use super::export::ExportReference;
use super::manifest::{BundleManifest, ResolvedBundle};
use crate::error::{CoatError, Result};
use crate::fetch::Fetcher;
use semver::Version;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use url::Url;

/// A bundle published to a remote repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoBundleRef {
    pub name: String,
    pub repository: String,
    pub version: String,
}

/// A bundle recorded in the local duffle home
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalBundleRef {
    pub name: String,

    /// Specific version; the latest recorded one when absent
    pub version: Option<String>,
}

/// The bundle a generation run is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleSelection {
    File { path: PathBuf },
    Repo(RepoBundleRef),
    Local(LocalBundleRef),
}

/// What a selection needs to read its manifest
#[derive(Debug, Clone, Copy)]
pub struct BundleSources<'a> {
    pub fetcher: &'a Fetcher,
    pub duffle_home: &'a Path,
}

impl BundleSelection {
    /// Parse a command-line bundle target.
    ///
    /// - `repo:<repository>/<name>:<version>`
    /// - `local:<name>` or `local:<name>:<version>`
    /// - `file:<path>` or a plain path
    pub fn parse_target(target: &str) -> Result<Self> {
        if let Some(rest) = target.strip_prefix("repo:") {
            let (repository, name_version) = rest.rsplit_once('/').ok_or_else(|| {
                CoatError::parse("bundle reference", format!("'{}' has no repository", target))
            })?;
            let (name, version) = name_version.rsplit_once(':').ok_or_else(|| {
                CoatError::parse("bundle reference", format!("'{}' has no version", target))
            })?;
            if repository.is_empty() || name.is_empty() || version.is_empty() {
                return Err(CoatError::parse(
                    "bundle reference",
                    format!("'{}' is incomplete", target),
                ));
            }
            return Ok(Self::Repo(RepoBundleRef {
                name: name.to_string(),
                repository: repository.to_string(),
                version: version.to_string(),
            }));
        }

        if let Some(rest) = target.strip_prefix("local:") {
            let (name, version) = match rest.split_once(':') {
                Some((name, version)) => (name, Some(version.to_string())),
                None => (rest, None),
            };
            if name.is_empty() {
                return Err(CoatError::parse(
                    "bundle reference",
                    format!("'{}' has no bundle name", target),
                ));
            }
            return Ok(Self::Local(LocalBundleRef {
                name: name.to_string(),
                version: version.filter(|v| !v.is_empty()),
            }));
        }

        let path = target.strip_prefix("file:").unwrap_or(target);
        Ok(Self::File {
            path: PathBuf::from(path),
        })
    }

    /// Display label; the basis of the generated project's name
    pub fn label(&self) -> String {
        match self {
            Self::File { path } => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Repo(bundle) => bundle.name.clone(),
            Self::Local(bundle) => bundle.name.clone(),
        }
    }

    /// Read the bundle text from its source
    pub async fn raw_text(&self, sources: BundleSources<'_>) -> Result<String> {
        match self {
            Self::File { path } => fs::read_to_string(path)
                .await
                .map_err(|e| CoatError::io_at("read bundle file", path, e)),
            Self::Repo(bundle) => {
                let url = repository_manifest_url(bundle)?;
                tracing::debug!(%url, "fetching repository manifest");
                sources.fetcher.fetch_text(&url).await
            }
            Self::Local(bundle) => {
                let path = local_record_path(sources.duffle_home, bundle).await?;
                fs::read_to_string(&path)
                    .await
                    .map_err(|e| CoatError::io_at("read local bundle", &path, e))
            }
        }
    }

    /// Read and parse the bundle
    pub async fn resolve(&self, sources: BundleSources<'_>) -> Result<ResolvedBundle> {
        let raw = self.raw_text(sources).await?;
        ResolvedBundle::parse(raw, &self.role())
    }

    pub async fn manifest(&self, sources: BundleSources<'_>) -> Result<BundleManifest> {
        Ok(self.resolve(sources).await?.manifest)
    }

    /// The reference handed to the bundle tool when exporting the full payload.
    ///
    /// Named selections must agree with the manifest they resolved to; a
    /// mismatch would export a different bundle than the one embedded.
    pub fn export_reference(&self, manifest: &BundleManifest) -> Result<ExportReference> {
        let (name, version) = match self {
            Self::File { path } => return Ok(ExportReference::File(path.clone())),
            Self::Repo(bundle) => (&bundle.name, bundle.version.clone()),
            Self::Local(bundle) => (
                &bundle.name,
                bundle
                    .version
                    .clone()
                    .unwrap_or_else(|| manifest.version.clone()),
            ),
        };

        if *name != manifest.name {
            return Err(CoatError::parse(
                self.role(),
                format!(
                    "manifest declares bundle '{}' but '{}' was selected",
                    manifest.name, name
                ),
            ));
        }

        Ok(ExportReference::Named {
            name: name.clone(),
            version,
        })
    }

    fn role(&self) -> String {
        match self {
            Self::File { path } => format!("bundle file {}", path.display()),
            Self::Repo(bundle) => format!(
                "repository bundle {}/{}:{}",
                bundle.repository, bundle.name, bundle.version
            ),
            Self::Local(bundle) => format!("local bundle {}", bundle.name),
        }
    }
}

impl fmt::Display for BundleSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { path } => write!(f, "{}", path.display()),
            Self::Repo(b) => write!(f, "{}/{}:{}", b.repository, b.name, b.version),
            Self::Local(b) => match &b.version {
                Some(v) => write!(f, "{}:{} (local)", b.name, v),
                None => write!(f, "{} (local)", b.name),
            },
        }
    }
}

/// `<repository>/repositories/<name>/tags/<version>`, https unless a scheme is given
fn repository_manifest_url(bundle: &RepoBundleRef) -> Result<Url> {
    let base = if bundle.repository.contains("://") {
        bundle.repository.clone()
    } else {
        format!("https://{}", bundle.repository)
    };
    let mut url =
        Url::parse(&base).map_err(|e| CoatError::parse(format!("repository '{}'", base), e))?;
    url.path_segments_mut()
        .map_err(|_| CoatError::parse(format!("repository '{}'", base), "cannot be a base URL"))?
        .pop_if_empty()
        .extend([
            "repositories",
            bundle.name.as_str(),
            "tags",
            bundle.version.as_str(),
        ]);
    Ok(url)
}

/// `<duffle_home>/bundles/<name>/<version>.json`
async fn local_record_path(duffle_home: &Path, bundle: &LocalBundleRef) -> Result<PathBuf> {
    let dir = duffle_home.join("bundles").join(&bundle.name);
    if let Some(version) = &bundle.version {
        return Ok(dir.join(format!("{}.json", version)));
    }

    let mut entries = fs::read_dir(&dir)
        .await
        .map_err(|e| CoatError::io_at("list local bundle versions in", &dir, e))?;
    let mut versions = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CoatError::io_at("list local bundle versions in", &dir, e))?
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            if let Some(stem) = path.file_stem() {
                versions.push(stem.to_string_lossy().into_owned());
            }
        }
    }

    let latest = latest_version(&versions).ok_or_else(|| {
        CoatError::io_at(
            "find a recorded version in",
            &dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "no bundle records"),
        )
    })?;
    Ok(dir.join(format!("{}.json", latest)))
}

/// Highest semver version; non-semver tags sort lexically below all semver ones
fn latest_version(versions: &[String]) -> Option<&String> {
    versions.iter().max_by(|a, b| {
        match (Version::parse(a), Version::parse(b)) {
            (Ok(va), Ok(vb)) => va.cmp(&vb),
            (Ok(_), Err(_)) => std::cmp::Ordering::Greater,
            (Err(_), Ok(_)) => std::cmp::Ordering::Less,
            (Err(_), Err(_)) => a.cmp(b),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = r#"{"name":"hello","version":"1.0","repository":"example/hello"}"#;

    #[test]
    fn test_parse_repo_target() {
        let selection = BundleSelection::parse_target("repo:hub.example.com/team/hello:1.0").unwrap();
        assert_eq!(
            selection,
            BundleSelection::Repo(RepoBundleRef {
                name: "hello".to_string(),
                repository: "hub.example.com/team".to_string(),
                version: "1.0".to_string(),
            })
        );
        assert_eq!(selection.label(), "hello");
    }

    #[test]
    fn test_parse_repo_target_requires_version() {
        assert!(BundleSelection::parse_target("repo:hub.example.com/hello").is_err());
        assert!(BundleSelection::parse_target("repo:hello:1.0").is_err());
    }

    #[test]
    fn test_parse_local_target() {
        assert_eq!(
            BundleSelection::parse_target("local:hello").unwrap(),
            BundleSelection::Local(LocalBundleRef {
                name: "hello".to_string(),
                version: None,
            })
        );
        assert_eq!(
            BundleSelection::parse_target("local:hello:0.2.0").unwrap(),
            BundleSelection::Local(LocalBundleRef {
                name: "hello".to_string(),
                version: Some("0.2.0".to_string()),
            })
        );
    }

    #[test]
    fn test_parse_file_target_and_label() {
        let selection = BundleSelection::parse_target("/bundles/my app.json").unwrap();
        assert_eq!(
            selection,
            BundleSelection::File {
                path: PathBuf::from("/bundles/my app.json")
            }
        );
        assert_eq!(selection.label(), "my app");
        assert_eq!(
            BundleSelection::parse_target("file:./b.json").unwrap().label(),
            "b"
        );
    }

    #[test]
    fn test_repository_manifest_url() {
        let url = repository_manifest_url(&RepoBundleRef {
            name: "hello".to_string(),
            repository: "hub.example.com".to_string(),
            version: "1.0".to_string(),
        })
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://hub.example.com/repositories/hello/tags/1.0"
        );
    }

    #[test]
    fn test_latest_version_prefers_semver() {
        let versions: Vec<String> = ["0.9.0", "0.10.0", "dev", "0.2.1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(latest_version(&versions).map(String::as_str), Some("0.10.0"));
        assert_eq!(latest_version(&[]), None);
    }

    #[tokio::test]
    async fn test_resolve_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.json");
        std::fs::write(&path, HELLO).unwrap();
        let fetcher = Fetcher::new("test");
        let sources = BundleSources {
            fetcher: &fetcher,
            duffle_home: dir.path(),
        };

        let selection = BundleSelection::File { path };
        let first = selection.manifest(sources).await.unwrap();
        let second = selection.manifest(sources).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.name, "hello");
    }

    #[tokio::test]
    async fn test_resolve_local_picks_latest_record() {
        let home = tempfile::tempdir().unwrap();
        let records = home.path().join("bundles").join("hello");
        std::fs::create_dir_all(&records).unwrap();
        std::fs::write(records.join("0.9.0.json"), r#"{"name":"hello","version":"0.9.0"}"#).unwrap();
        std::fs::write(records.join("1.0.0.json"), r#"{"name":"hello","version":"1.0.0"}"#).unwrap();
        std::fs::write(records.join("notes.txt"), "ignored").unwrap();

        let fetcher = Fetcher::new("test");
        let sources = BundleSources {
            fetcher: &fetcher,
            duffle_home: home.path(),
        };
        let selection = BundleSelection::parse_target("local:hello").unwrap();
        let manifest = selection.manifest(sources).await.unwrap();
        assert_eq!(manifest.version, "1.0.0");

        let pinned = BundleSelection::parse_target("local:hello:0.9.0").unwrap();
        assert_eq!(pinned.manifest(sources).await.unwrap().version, "0.9.0");
    }

    #[tokio::test]
    async fn test_resolve_repo_over_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let tag_dir = dir.path().join("repositories").join("hello").join("tags");
        std::fs::create_dir_all(&tag_dir).unwrap();
        std::fs::write(tag_dir.join("1.0"), HELLO).unwrap();

        let fetcher = Fetcher::new("test");
        let selection = BundleSelection::Repo(RepoBundleRef {
            name: "hello".to_string(),
            repository: Url::from_directory_path(dir.path()).unwrap().to_string(),
            version: "1.0".to_string(),
        });
        let manifest = selection
            .manifest(BundleSources {
                fetcher: &fetcher,
                duffle_home: dir.path(),
            })
            .await
            .unwrap();
        assert_eq!(manifest.repository.as_deref(), Some("example/hello"));
    }

    #[test]
    fn test_export_reference_checks_declared_name() {
        let manifest: BundleManifest = serde_json::from_str(HELLO).unwrap();

        let matching = BundleSelection::parse_target("local:hello").unwrap();
        assert_eq!(
            matching.export_reference(&manifest).unwrap(),
            ExportReference::Named {
                name: "hello".to_string(),
                version: "1.0".to_string()
            }
        );

        let other = BundleSelection::parse_target("repo:hub.example.com/other:1.0").unwrap();
        assert!(other.export_reference(&manifest).is_err());

        let file = BundleSelection::parse_target("x/whatever.json").unwrap();
        assert_eq!(
            file.export_reference(&manifest).unwrap(),
            ExportReference::File(PathBuf::from("x/whatever.json"))
        );
    }
}
