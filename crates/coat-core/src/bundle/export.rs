//! Full bundle payload export through the duffle CLI
//!
//! The exported archive is produced by `duffle export`; this module only
//! builds the invocation and checks that it produced something.

use crate::error::{CoatError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Exports pull every invocation image, so allow them plenty of time
const EXPORT_TIMEOUT: Duration = Duration::from_secs(600);

/// What `duffle export` is pointed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportReference {
    /// A bundle file on disk
    File(PathBuf),
    /// A bundle known to duffle by name and version
    Named { name: String, version: String },
}

/// Runs the bundle tool to export full payloads
#[derive(Debug, Clone)]
pub struct BundleExporter {
    tool: String,
}

impl BundleExporter {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Arguments passed to the tool for one export
    pub fn command_args(reference: &ExportReference, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["export".into()];
        match reference {
            ExportReference::File(path) => {
                args.push(path.clone().into_os_string());
                args.push("--bundle-is-file".into());
            }
            ExportReference::Named { name, version } => {
                args.push(format!("{}:{}", name, version).into());
            }
        }
        args.push("--output".into());
        args.push(output.as_os_str().to_os_string());
        args
    }

    /// Export `reference` to `output`
    pub async fn export(&self, reference: &ExportReference, output: &Path) -> Result<()> {
        let args = Self::command_args(reference, output);
        tracing::debug!(tool = %self.tool, ?args, "exporting bundle");

        let child = Command::new(&self.tool)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.failure(format!("could not start: {}", e)))?;

        let output_result = match timeout(EXPORT_TIMEOUT, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| self.failure(e.to_string()))?,
            Err(_) => {
                return Err(self.failure(format!(
                    "export timed out after {} seconds",
                    EXPORT_TIMEOUT.as_secs()
                )))
            }
        };

        if !output_result.status.success() {
            let stderr = String::from_utf8_lossy(&output_result.stderr);
            return Err(self.failure(format!(
                "exit code {}: {}",
                output_result.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        if !output.exists() {
            return Err(self.failure(format!(
                "export reported success but {} was not written",
                output.display()
            )));
        }

        Ok(())
    }

    fn failure(&self, message: String) -> CoatError {
        CoatError::Tool {
            tool: self.tool.clone(),
            message,
        }
    }
}
