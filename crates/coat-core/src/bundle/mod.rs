//! Bundle selection, resolution and export
//!
//! A bundle may come from a file on disk, a remote repository, or the local
//! duffle home. All three resolve to the same [`ResolvedBundle`].

pub mod export;
pub mod manifest;
pub mod selection;

pub use export::{BundleExporter, ExportReference};
pub use manifest::{BundleManifest, ResolvedBundle, SIGNATURE_MARKER};
pub use selection::{BundleSelection, BundleSources, LocalBundleRef, RepoBundleRef};
