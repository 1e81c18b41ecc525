//! The interface a generation run uses to talk to its caller

use crate::bundle::BundleSelection;
use crate::cancellable::Cancellable;
use crate::error::Result;
use crate::folder::{ConflictChoice, FolderPrompter};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Everything the generator asks of the user-facing surface
pub trait GenerationUi: FolderPrompter + Send {
    /// Asked only when the run was started without a bundle
    fn select_bundle(&mut self) -> Result<Cancellable<BundleSelection>>;

    /// Directory the project folder `project_name` will be created in
    fn select_parent_folder(&mut self, project_name: &str) -> Result<Cancellable<PathBuf>>;

    /// Progress narration; throttled by the generator
    fn progress(&mut self, message: &str);
}

/// Non-interactive answers fixed up front, for library callers and tests.
///
/// Any question without a preset answer is treated as cancelled.
#[derive(Debug, Clone, Default)]
pub struct PresetUi {
    pub bundle: Option<BundleSelection>,
    pub parent: Option<PathBuf>,
    pub on_conflict: Option<ConflictChoice>,
    pub redirect_names: VecDeque<String>,

    /// Progress messages received so far
    pub messages: Vec<String>,
}

impl PresetUi {
    pub fn new(parent: impl Into<PathBuf>) -> Self {
        Self {
            parent: Some(parent.into()),
            ..Default::default()
        }
    }

    pub fn on_conflict(mut self, choice: ConflictChoice) -> Self {
        self.on_conflict = Some(choice);
        self
    }

    pub fn redirect_to(mut self, name: impl Into<String>) -> Self {
        self.redirect_names.push_back(name.into());
        self
    }
}

impl FolderPrompter for PresetUi {
    fn resolve_conflict(&mut self, folder: &Path) -> Result<Cancellable<ConflictChoice>> {
        tracing::debug!(folder = %folder.display(), choice = ?self.on_conflict, "folder exists");
        // Redirect is only answerable while names remain
        let choice = match self.on_conflict {
            Some(ConflictChoice::Redirect) if self.redirect_names.is_empty() => None,
            other => other,
        };
        Ok(choice.into())
    }

    fn redirect_folder_name(&mut self, _folder: &Path) -> Result<Cancellable<String>> {
        Ok(self.redirect_names.pop_front().into())
    }
}

impl GenerationUi for PresetUi {
    fn select_bundle(&mut self) -> Result<Cancellable<BundleSelection>> {
        Ok(self.bundle.take().into())
    }

    fn select_parent_folder(&mut self, _project_name: &str) -> Result<Cancellable<PathBuf>> {
        Ok(self.parent.clone().into())
    }

    fn progress(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}
