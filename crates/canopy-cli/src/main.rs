#![forbid(unsafe_code)]

mod cmd;
mod output;

use canopy_core::config::{EffectiveConfig, resolve_config};
use canopy_core::error::ErrorCode;
use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "canopy: incremental entity hierarchies and change-set generation",
    long_about = None
)]
struct Cli {
    /// Output format. Defaults to pretty on a terminal and text when piped.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Project root holding `.canopy/config.toml`. Defaults to the current directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a JSON-lines event log into a hierarchy view and print it.
    Replay(cmd::replay::ReplayArgs),

    /// Generate (and optionally apply) the change set creating an entity.
    Create(cmd::edit::CreateArgs),

    /// Generate (and optionally apply) the change set moving an entity.
    Move(cmd::edit::MoveArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CANOPY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "canopy=debug,info"
        } else {
            "canopy=info,warn"
        })
    });

    let format = env::var("CANOPY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn load_config(project_root: &Path, cli: &Cli) -> anyhow::Result<(EffectiveConfig, OutputMode)> {
    let config = match resolve_config(project_root, cli.json) {
        Ok(config) => config,
        Err(e) => {
            let mode = cli.format.unwrap_or(OutputMode::Text);
            render_error(mode, &CliError::coded(format!("{e:#}"), ErrorCode::ConfigParseError))?;
            return Err(e);
        }
    };
    let mode = cli
        .format
        .unwrap_or_else(|| OutputMode::from_resolved(&config.resolved_output));
    debug!(?mode, root = %project_root.display(), "resolved configuration");
    Ok((config, mode))
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let project_root = match &cli.root {
        Some(root) => root.clone(),
        None => env::current_dir()?,
    };
    let (config, output) = load_config(&project_root, &cli)?;

    match &cli.command {
        Commands::Replay(args) => cmd::replay::run_replay(args, &config.project, output),
        Commands::Create(args) => cmd::edit::run_create(args, &config.project, output),
        Commands::Move(args) => cmd::edit::run_move(args, &config.project, output),
    }
}
