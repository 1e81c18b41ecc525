//! Charm-style CLI prompts using cliclack

use crate::bundle::BundleSelection;
use crate::cancellable::Cancellable;
use crate::config::GeneratorConfig;
use crate::error::{CoatError, Result as CoatResult};
use crate::folder::{check_folder_name, ConflictChoice, FolderPrompter};
use crate::generate::{
    FollowUp, GenerateOptions, GeneratedProject, GenerationResult, GenerationUi, Generator,
};
use anyhow::Result;
use console::{style, Term};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// CLI arguments for the generate command
#[derive(Debug, Clone, Default)]
pub struct GenerateArgs {
    /// Bundle target: a file path, `repo:<repository>/<name>:<version>` or `local:<name>[:<version>]`
    pub target: Option<String>,

    /// Directory the project folder is created in
    pub parent: Option<PathBuf>,

    /// Answer to give if the project folder already exists
    pub on_conflict: Option<ConflictChoice>,

    /// Folder name to use when redirecting
    pub rename: Option<String>,

    /// Export the full bundle into the project
    pub full_bundle: bool,

    /// Always download the template
    pub no_template_cache: bool,

    /// Open the project when done
    pub open: bool,

    /// Auto-confirm all prompts (non-interactive mode)
    pub yes: bool,
}

impl GenerateArgs {
    fn options(&self) -> GenerateOptions {
        GenerateOptions {
            full_bundle: self.full_bundle,
            cache_template: !self.no_template_cache,
        }
    }
}

/// Prompts through cliclack; any answer given on the command line skips its
/// prompt. With `--yes` nothing is asked and an unanswered question cancels.
pub struct CliclackUi {
    parent: Option<PathBuf>,
    on_conflict: Option<ConflictChoice>,
    rename: Option<String>,
    interactive: bool,
    term: Term,
    /// Whether the last line written is a progress line still being updated
    progress_open: bool,
}

impl CliclackUi {
    pub fn new(args: &GenerateArgs) -> Self {
        Self {
            parent: args.parent.clone(),
            on_conflict: args.on_conflict,
            rename: args.rename.clone(),
            interactive: !args.yes,
            term: Term::stderr(),
            progress_open: false,
        }
    }

    /// Finish the in-place progress line before anything else is printed
    fn settle(&mut self) {
        if self.progress_open {
            let _ = self.term.write_line("");
            self.progress_open = false;
        }
    }
}

/// Ctrl+C or Esc inside a prompt is a cancellation, not a failure
fn answered<T>(result: std::io::Result<T>) -> CoatResult<Cancellable<T>> {
    match result {
        Ok(value) => Ok(Cancellable::Accepted(value)),
        Err(e) if e.kind() == ErrorKind::Interrupted => Ok(Cancellable::Cancelled),
        Err(e) => Err(CoatError::io("Prompt failed", e)),
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    std::env::current_dir()
        .map(|current| current.join(&path))
        .unwrap_or(path)
}

impl FolderPrompter for CliclackUi {
    fn resolve_conflict(&mut self, folder: &Path) -> CoatResult<Cancellable<ConflictChoice>> {
        self.settle();
        // A preset answer is used once; a redirect into another taken folder asks
        if let Some(choice) = self.on_conflict.take() {
            return Ok(Cancellable::Accepted(choice));
        }
        if !self.interactive {
            return Ok(Cancellable::Cancelled);
        }

        let mut select = cliclack::select(format!(
            "{} already exists",
            style(folder.display()).cyan()
        ));
        for choice in ConflictChoice::ALL {
            let hint = match choice {
                ConflictChoice::Update => "keep the project, refresh bundle and metadata",
                ConflictChoice::Overwrite => "erase the folder and generate again",
                ConflictChoice::Redirect => "pick another folder name",
            };
            select = select.item(choice, choice.label(), hint);
        }
        answered(select.interact())
    }

    fn redirect_folder_name(&mut self, folder: &Path) -> CoatResult<Cancellable<String>> {
        self.settle();
        if let Some(name) = self.rename.take() {
            return Ok(Cancellable::Accepted(name));
        }
        if !self.interactive {
            return Ok(Cancellable::Cancelled);
        }

        let current = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        answered(
            cliclack::input("Folder name")
                .placeholder(&current)
                .validate(|input: &String| check_folder_name(input).map(|_| ()))
                .interact(),
        )
    }
}

impl GenerationUi for CliclackUi {
    fn select_bundle(&mut self) -> CoatResult<Cancellable<BundleSelection>> {
        self.settle();
        if !self.interactive {
            let _ = cliclack::log::warning("A bundle target is required with --yes");
            return Ok(Cancellable::Cancelled);
        }
        let target: String = match answered(
            cliclack::input("Bundle")
                .placeholder("path/to/bundle.json, repo:<repository>/<name>:<version> or local:<name>")
                .validate(|input: &String| {
                    BundleSelection::parse_target(input.trim())
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                })
                .interact(),
        )? {
            Cancellable::Accepted(target) => target,
            Cancellable::Cancelled => return Ok(Cancellable::Cancelled),
        };
        BundleSelection::parse_target(target.trim()).map(Cancellable::Accepted)
    }

    fn select_parent_folder(&mut self, project_name: &str) -> CoatResult<Cancellable<PathBuf>> {
        self.settle();
        if let Some(parent) = self.parent.take() {
            let parent = absolute(parent);
            let _ = cliclack::log::info(format!("Using directory: {}", parent.display()));
            return Ok(Cancellable::Accepted(parent));
        }
        if !self.interactive {
            return Ok(Cancellable::Accepted(absolute(PathBuf::from("."))));
        }

        let input: String = match answered(
            cliclack::input(format!("Where should '{}' be created?", project_name))
                .placeholder(".")
                .default_input(".")
                .interact(),
        )? {
            Cancellable::Accepted(input) => input,
            Cancellable::Cancelled => return Ok(Cancellable::Cancelled),
        };
        Ok(Cancellable::Accepted(absolute(PathBuf::from(input.trim()))))
    }

    fn progress(&mut self, message: &str) {
        if self.progress_open {
            let _ = self.term.clear_line();
        }
        let _ = self
            .term
            .write_str(&format!("{}  {}", style("◇").green(), style(message).dim()));
        self.progress_open = true;
    }
}

/// Run one generation with interactive prompts, or with `--yes` without any
pub async fn run(config: GeneratorConfig, args: GenerateArgs) -> Result<()> {
    cliclack::intro(style(" duffle-coat ").black().on_cyan())?;

    if let Some(name) = &args.rename {
        check_folder_name(name).map_err(anyhow::Error::msg)?;
    }

    let selection = args
        .target
        .as_deref()
        .map(|t| BundleSelection::parse_target(t.trim()))
        .transpose()?;
    let options = args.options();
    let generator = Generator::new(config);

    let mut ui = CliclackUi::new(&args);
    let result: GenerationResult = generator.generate(selection, &options, &mut ui).await.into();
    ui.settle();

    match result {
        GenerationResult::Succeeded(project) => finish(&project, &args),
        GenerationResult::Cancelled => {
            cliclack::outro_cancel("Cancelled")?;
            Ok(())
        }
        GenerationResult::Failed(messages) => {
            for message in &messages[1..] {
                cliclack::log::remark(message)?;
            }
            cliclack::outro_cancel("Generation failed")?;
            anyhow::bail!(messages.join(": "))
        }
    }
}

fn finish(project: &GeneratedProject, args: &GenerateArgs) -> Result<()> {
    cliclack::log::success(format!(
        "Generated {} ({})",
        style(project.folder.display()).cyan(),
        project.action
    ))?;

    if let Some(follow_up) = &project.follow_up {
        let wanted = match follow_up {
            FollowUp::OpenProject(_) if args.open => true,
            FollowUp::OpenProject(_) if args.yes => false,
            FollowUp::OpenProject(_) => cliclack::confirm(format!("{}?", follow_up.label()))
                .initial_value(false)
                .interact()
                .unwrap_or(false),
        };
        if wanted {
            follow_up.invoke()?;
        }
    }

    cliclack::outro("Run `npm install` in the project to build the installer")?;
    Ok(())
}
