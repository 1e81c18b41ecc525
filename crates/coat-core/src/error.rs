//! Error taxonomy for generation runs
//!
//! Every step of a run returns `Result<T, CoatError>`. Cancellation is not an
//! error: it travels as [`crate::Cancellable::Cancelled`] instead.

use std::error::Error as _;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoatError>;

#[derive(Debug, Error)]
pub enum CoatError {
    /// Transport or HTTP status failure while fetching a URL
    #[error("Failed to download {url}: {message}")]
    Network { url: String, message: String },

    /// Filesystem read/write/copy/remove/mkdir failure
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed manifest or metadata document
    #[error("Failed to parse {role}: {message}")]
    Parse { role: String, message: String },

    /// A metadata field the generator rewrites is missing
    #[error("{file} does not contain expected field '{field}'")]
    Structural { file: String, field: String },

    /// Cache lookup miss
    #[error("'{key}' is not present in the {namespace} cache")]
    NotFound { namespace: String, key: String },

    /// Zip or tar extraction failure
    #[error("Failed to extract {archive} into {}: {message}", .destination.display())]
    Extract {
        archive: String,
        destination: PathBuf,
        message: String,
    },

    /// The bundle tool exited unsuccessfully or could not be started
    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    /// Folder redirection did not settle
    #[error("Gave up choosing a project folder after {attempts} attempts")]
    Redirects { attempts: usize },
}

impl CoatError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// IO error whose context names the operation and the path it touched
    pub fn io_at(operation: &str, path: &Path, source: std::io::Error) -> Self {
        Self::io(format!("Failed to {} {}", operation, path.display()), source)
    }

    pub fn parse(role: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            role: role.into(),
            message: message.to_string(),
        }
    }

    pub fn structural(file: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Structural {
            file: file.into(),
            field: field.into(),
        }
    }

    pub fn network(url: impl ToString, message: impl ToString) -> Self {
        Self::Network {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    /// The error and each of its sources as user-facing lines. Never empty.
    pub fn messages(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut source = self.source();
        while let Some(err) = source {
            let line = err.to_string();
            if !messages.iter().any(|m| m.contains(&line)) {
                messages.push(line);
            }
            source = err.source();
        }
        messages
    }
}
