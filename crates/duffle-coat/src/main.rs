//! duffle-coat CLI - Self-installer generation for duffle bundles

use anyhow::Result;
use clap::{Parser, Subcommand};
use coat_core::tui::GenerateArgs;
use coat_core::{ConflictChoice, GeneratorConfig};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `coat_core=debug`)
const LOG_ENV: &str = "DUFFLE_COAT_LOG";

#[derive(Parser, Debug)]
#[command(name = "duffle-coat")]
#[command(about = "Generate self-installer projects from duffle bundles")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a self-installer project for a bundle
    Generate(CliGenerateArgs),
}

#[derive(Parser, Debug)]
pub struct CliGenerateArgs {
    /// Bundle file path, repo:<repository>/<name>:<version> or local:<name>[:<version>]
    pub target: Option<String>,

    /// Directory to create the project folder in
    #[arg(short, long)]
    pub parent: Option<PathBuf>,

    /// What to do if the project folder exists (update, overwrite, redirect)
    #[arg(long = "on-conflict")]
    pub on_conflict: Option<ConflictChoice>,

    /// Folder name to use when redirecting
    #[arg(long)]
    pub rename: Option<String>,

    /// Export the full bundle (images included) into the project
    #[arg(long = "full-bundle")]
    pub full_bundle: bool,

    /// Always download the template instead of using the cache
    #[arg(long = "no-template-cache")]
    pub no_template_cache: bool,

    /// Open the generated project when done
    #[arg(long)]
    pub open: bool,

    /// Auto-confirm all prompts (non-interactive mode)
    #[arg(short, long)]
    pub yes: bool,
}

impl From<CliGenerateArgs> for GenerateArgs {
    fn from(args: CliGenerateArgs) -> Self {
        GenerateArgs {
            target: args.target,
            parent: args.parent,
            on_conflict: args.on_conflict,
            rename: args.rename,
            full_bundle: args.full_bundle,
            no_template_cache: args.no_template_cache,
            open: args.open,
            yes: args.yes,
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    // Ensure terminal cursor is restored on panic
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = console::Term::stderr().show_cursor();
        default_panic(info);
    }));

    // Handle Ctrl+C gracefully
    ctrlc::set_handler(move || {
        let _ = console::Term::stderr().show_cursor();
        std::process::exit(130);
    })
    .ok();

    init_logging();

    let args = Args::parse();
    let generate_args = match args.command {
        Some(Command::Generate(generate_args)) => generate_args.into(),
        // No subcommand provided, default to generate behavior (interactive mode)
        None => GenerateArgs::default(),
    };

    let result = run(generate_args).await;

    // Ensure cursor is visible on normal exit
    let _ = console::Term::stderr().show_cursor();

    if let Err(e) = result {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(args: GenerateArgs) -> Result<()> {
    let config = GeneratorConfig::from_env()?;
    tracing::debug!(?config, "configuration loaded");
    coat_core::run(config, args).await
}
