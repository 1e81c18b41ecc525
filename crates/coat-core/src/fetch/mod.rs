//! Downloading and unpacking of remote artifacts
//!
//! This module provides:
//! - Streaming downloads from `http(s)://` or `file://` URLs
//! - Cache-aware downloads that fall back to the network
//! - Zip and gzip-tar extraction behind one error model
//! - A wall-clock throttle for progress reporting

pub mod extract;
pub mod fetcher;
pub mod progress;

pub use extract::ArchiveFormat;
pub use fetcher::{CacheSlot, Fetcher};
pub use progress::ProgressThrottle;
