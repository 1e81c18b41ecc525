//! Coat Core - library behind the `duffle-coat` generator
//!
//! Turns a CNAB bundle reference into a self-installer project: a template
//! application with the bundle's data, identity and the duffle binaries for
//! every supported platform baked in.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **Layer 1: Core Operations** - Archive cache, fetching/extraction, bundle resolution
//! - **Layer 2: Workflow Orchestration** - Folder resolution and the [`Generator`]
//! - **Layer 3: CLI/TUI Interface** - Optional cliclack-based prompts (feature-gated)
//!
//! # Feature Flags
//!
//! - `tui` (default): Enables the cliclack-based TUI prompts module
//!
//! # Example Usage (without TUI)
//!
//! ```ignore
//! use coat_core::{BundleSelection, GenerateOptions, Generator, GeneratorConfig, PresetUi};
//!
//! let generator = Generator::new(GeneratorConfig::from_env()?);
//! let bundle = BundleSelection::parse_target("local:hello")?;
//! let mut ui = PresetUi::new("/tmp/installers");
//! let outcome = generator
//!     .generate(Some(bundle), &GenerateOptions::default(), &mut ui)
//!     .await?;
//! ```

pub mod bundle;
pub mod cache;
pub mod cancellable;
pub mod config;
pub mod error;
pub mod fetch;
pub mod folder;
pub mod generate;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export main types for convenience
pub use bundle::{BundleManifest, BundleSelection, ResolvedBundle};
pub use cache::ArchiveCache;
pub use cancellable::Cancellable;
pub use config::GeneratorConfig;
pub use error::{CoatError, Result};
pub use fetch::{ArchiveFormat, Fetcher};
pub use folder::{resolve_folder, ConflictChoice, FolderAction, FolderPrompter, GenerationTarget};
pub use generate::{
    FollowUp, GenerateOptions, GeneratedProject, GenerationResult, GenerationUi, Generator,
    PresetUi,
};

#[cfg(feature = "tui")]
pub use tui::run;
