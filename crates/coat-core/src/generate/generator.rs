//! The generation run: bundle in, self-installer project out

use super::binaries::{self, BinaryJob, Platform, BINARY_DIR};
use super::metadata::{self, ProjectIdentity};
use super::naming::safe_name;
use super::ui::GenerationUi;
use crate::bundle::{BundleExporter, BundleSelection, BundleSources, ResolvedBundle};
use crate::cache::{ArchiveCache, BINARY_NAMESPACE, TEMPLATE_NAMESPACE};
use crate::cancellable::Cancellable;
use crate::config::GeneratorConfig;
use crate::error::{CoatError, Result};
use crate::fetch::{ArchiveFormat, CacheSlot, Fetcher, ProgressThrottle};
use crate::folder::{self, FolderAction, GenerationTarget};
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;
use tokio::sync::mpsc;

/// Fixed locations of bundle data inside a generated project
pub const BUNDLE_JSON: &str = "data/bundle.json";
pub const BUNDLE_CNAB: &str = "data/bundle.cnab";
pub const BUNDLE_TGZ: &str = "data/bundle.tgz";

/// Per-run switches
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Export the full bundle payload into `data/bundle.tgz`
    pub full_bundle: bool,

    /// Serve the template archive from the template cache
    pub cache_template: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            full_bundle: false,
            cache_template: true,
        }
    }
}

/// Something the caller may do once the project exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    OpenProject(PathBuf),
}

impl FollowUp {
    pub fn label(&self) -> &'static str {
        match self {
            FollowUp::OpenProject(_) => "Open Project",
        }
    }

    pub fn invoke(&self) -> Result<()> {
        match self {
            FollowUp::OpenProject(folder) => {
                open::that(folder).map_err(|e| CoatError::io_at("open", folder, e))
            }
        }
    }
}

/// A successfully generated project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedProject {
    pub folder: PathBuf,
    pub action: FolderAction,
    pub follow_up: Option<FollowUp>,
}

/// How a run ended, as shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    Succeeded(GeneratedProject),
    /// Non-empty list of human-readable messages
    Failed(Vec<String>),
    /// The user walked away; nothing to report
    Cancelled,
}

impl From<Result<Cancellable<GeneratedProject>>> for GenerationResult {
    fn from(result: Result<Cancellable<GeneratedProject>>) -> Self {
        match result {
            Ok(Cancellable::Accepted(project)) => GenerationResult::Succeeded(project),
            Ok(Cancellable::Cancelled) => GenerationResult::Cancelled,
            Err(e) => GenerationResult::Failed(e.messages()),
        }
    }
}

impl fmt::Display for GenerationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationResult::Succeeded(project) => {
                write!(f, "Generated {}", project.folder.display())
            }
            GenerationResult::Failed(messages) => write!(f, "{}", messages.join("\n")),
            GenerationResult::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Generates self-installer projects
pub struct Generator {
    config: GeneratorConfig,
    fetcher: Fetcher,
    template_cache: ArchiveCache,
    binary_cache: ArchiveCache,
    exporter: BundleExporter,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        let fetcher = Fetcher::new(&config.user_agent);
        let template_cache = ArchiveCache::new(&config.cache_root, TEMPLATE_NAMESPACE);
        let binary_cache = ArchiveCache::new(&config.cache_root, BINARY_NAMESPACE);
        let exporter = BundleExporter::new(config.duffle_tool.clone());
        Self {
            config,
            fetcher,
            template_cache,
            binary_cache,
            exporter,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Run one generation. `selection` is requested from `ui` when absent.
    ///
    /// Each step stops the run on failure; cancellation at any prompt ends it
    /// with `Cancelled` and no further work.
    pub async fn generate<U: GenerationUi>(
        &self,
        selection: Option<BundleSelection>,
        options: &GenerateOptions,
        ui: &mut U,
    ) -> Result<Cancellable<GeneratedProject>> {
        let selection = match selection {
            Some(selection) => selection,
            None => match ui.select_bundle()? {
                Cancellable::Accepted(selection) => selection,
                Cancellable::Cancelled => return Ok(Cancellable::Cancelled),
            },
        };

        let project_name = safe_name(&selection.label());
        tracing::info!(bundle = %selection, %project_name, "generating self-installer");

        ui.progress(&format!("Reading bundle {}", selection));
        let bundle = selection
            .resolve(BundleSources {
                fetcher: &self.fetcher,
                duffle_home: &self.config.duffle_home,
            })
            .await?;

        // Held until the payload is copied into the project
        let export = if options.full_bundle {
            ui.progress("Exporting full bundle");
            Some(self.export_payload(&selection, &bundle).await?)
        } else {
            None
        };

        let parent = match ui.select_parent_folder(&project_name)? {
            Cancellable::Accepted(parent) => parent,
            Cancellable::Cancelled => return Ok(Cancellable::Cancelled),
        };

        let target =
            match folder::resolve_folder(parent.join(&project_name), ui, |p| p.exists())? {
                Cancellable::Accepted(target) => target,
                Cancellable::Cancelled => return Ok(Cancellable::Cancelled),
            };
        let GenerationTarget { action, folder } = target;
        tracing::info!(%action, folder = %folder.display(), "target folder decided");

        match action {
            FolderAction::New => self.fetch_template(&folder, options, ui).await?,
            FolderAction::Overwrite => {
                clear_folder(&folder).await?;
                self.fetch_template(&folder, options, ui).await?;
            }
            FolderAction::Update => {}
        }

        ui.progress("Writing bundle data");
        write_bundle_data(&folder, &bundle, export.as_ref().map(|(_, path)| path.as_path()))
            .await?;
        drop(export);

        ui.progress("Updating project metadata");
        let identity =
            ProjectIdentity::new(&bundle.manifest, &project_name, &self.config.current_user_name);
        metadata::rewrite_project(&folder, &identity).await?;

        self.fetch_binaries(&folder, ui).await?;

        Ok(Cancellable::Accepted(GeneratedProject {
            follow_up: Some(FollowUp::OpenProject(folder.clone())),
            folder,
            action,
        }))
    }

    async fn export_payload(
        &self,
        selection: &BundleSelection,
        bundle: &ResolvedBundle,
    ) -> Result<(TempDir, PathBuf)> {
        let reference = selection.export_reference(&bundle.manifest)?;
        let dir = tempfile::Builder::new()
            .prefix("duffle-coat-export-")
            .tempdir()
            .map_err(|e| CoatError::io("Failed to create export directory", e))?;
        let output = dir.path().join("bundle.tgz");
        self.exporter.export(&reference, &output).await?;
        Ok((dir, output))
    }

    async fn fetch_template<U: GenerationUi>(
        &self,
        folder: &Path,
        options: &GenerateOptions,
        ui: &mut U,
    ) -> Result<()> {
        let url = &self.config.template_url;
        ui.progress(&format!("Downloading template from {}", url));

        let key = url_cache_key(url.as_str(), ArchiveFormat::Zip);
        let slot = options.cache_template.then(|| CacheSlot {
            cache: &self.template_cache,
            key: &key,
        });

        let mut throttle = ProgressThrottle::per_second(|mb| {
            ui.progress(&format!("Downloading template: {:.1} MB", mb));
        });
        let mut on_chunk = |bytes: u64| throttle.record(bytes);

        self.fetcher
            .download_archive(url, ArchiveFormat::Zip, folder, slot, Some(&mut on_chunk))
            .await
    }

    async fn fetch_binaries<U: GenerationUi>(&self, folder: &Path, ui: &mut U) -> Result<()> {
        let destination = folder.join(BINARY_DIR);
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let mut handles = Vec::with_capacity(Platform::ALL.len());
        for platform in Platform::ALL {
            let job = BinaryJob {
                platform,
                url: self.config.binary_url(platform.name())?,
                cache_key: platform.cache_key(&self.config.binary_version),
                destination: destination.clone(),
            };
            handles.push(tokio::spawn(binaries::fetch_binary(
                self.fetcher.clone(),
                self.binary_cache.clone(),
                job,
                sender.clone(),
            )));
        }
        drop(sender);

        ui.progress("Downloading installer binaries");
        // Closes once every task has finished and dropped its sender
        while let Some(message) = receiver.recv().await {
            ui.progress(&message);
        }

        binaries::join_in_order(handles).await?;
        Ok(())
    }
}

/// Remove everything inside `folder`, keeping the folder itself
async fn clear_folder(folder: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(folder).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(folder).to_path_buf();
            CoatError::io_at("list", &path, e.into())
        })?;
        let path = entry.path();
        let removed = if entry.file_type().is_dir() {
            fs::remove_dir_all(path).await
        } else {
            fs::remove_file(path).await
        };
        removed.map_err(|e| CoatError::io_at("remove", path, e))?;
    }
    Ok(())
}

async fn write_bundle_data(
    folder: &Path,
    bundle: &ResolvedBundle,
    exported: Option<&Path>,
) -> Result<()> {
    let json_path = folder.join(BUNDLE_JSON);
    if let Some(data_dir) = json_path.parent() {
        fs::create_dir_all(data_dir)
            .await
            .map_err(|e| CoatError::io_at("create directory", data_dir, e))?;
    }

    fs::write(&json_path, &bundle.manifest_text)
        .await
        .map_err(|e| CoatError::io_at("write", &json_path, e))?;

    // Leftovers from a previous run must not outlive the bundle they came from
    let cnab_path = folder.join(BUNDLE_CNAB);
    if bundle.is_signed() {
        fs::write(&cnab_path, &bundle.raw_text)
            .await
            .map_err(|e| CoatError::io_at("write", &cnab_path, e))?;
    } else {
        remove_if_present(&cnab_path).await?;
    }

    let tgz_path = folder.join(BUNDLE_TGZ);
    match exported {
        Some(exported) => {
            fs::copy(exported, &tgz_path)
                .await
                .map_err(|e| CoatError::io_at("write", &tgz_path, e))?;
        }
        None => remove_if_present(&tgz_path).await?,
    }

    Ok(())
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CoatError::io_at("remove", path, e)),
    }
}

/// Cache key for an artifact URL; distinct URLs never share an entry
fn url_cache_key(url: &str, format: ArchiveFormat) -> String {
    let name: String = url
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    format!("{}.{}", name, format.extension())
}
