//! Project generation
//!
//! [`Generator::generate`] drives one run: pick a bundle, pick a folder,
//! lay down the installer template, write the bundle data, stamp the
//! bundle's identity into the project metadata and fetch the platform
//! binaries.

pub mod binaries;
pub mod generator;
pub mod metadata;
pub mod naming;
pub mod ui;

pub use binaries::{Platform, BINARY_DIR};
pub use generator::{
    FollowUp, GenerateOptions, GeneratedProject, GenerationResult, Generator, BUNDLE_CNAB,
    BUNDLE_JSON, BUNDLE_TGZ,
};
pub use metadata::ProjectIdentity;
pub use naming::{package_name, safe_name};
pub use ui::{GenerationUi, PresetUi};
