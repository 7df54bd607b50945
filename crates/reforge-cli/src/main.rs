mod orchestrator;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use reforge_core::{parse_blueprint_specs, TargetSpec, UpgradeError};
use reforge_exec::SystemRunner;
use reforge_registry::{HttpRegistry, DEFAULT_REGISTRY_URL};
use reforge_vcs::GitCli;

use orchestrator::{UpgradeOptions, UpgradeOrchestrator, UpgradeOutcome};
use render::Renderer;

#[derive(Parser, Debug)]
#[command(name = "reforge")]
#[command(about = "Upgrade orchestrator for scaffolded projects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upgrade the project in the current directory to a newer generator version
    Upgrade {
        /// Upgrade to a specific version, or 'latest' (default), or 'global'
        /// to use the globally installed generator
        #[arg(long)]
        target_version: Option<String>,
        /// Pin blueprint targets, e.g. foo@0.0.1,bar@1.0.2
        #[arg(long)]
        target_blueprint_versions: Option<String>,
        /// Proceed even when no newer version is available
        #[arg(long)]
        force: bool,
        /// Skip the final dependency installation
        #[arg(long)]
        skip_install: bool,
        /// Hide progress output
        #[arg(long)]
        silent: bool,
        /// Echo every external command before running it
        #[arg(long)]
        verbose: bool,
        #[arg(long, default_value = DEFAULT_REGISTRY_URL)]
        registry_url: String,
        /// Project directory (defaults to the current directory)
        #[arg(long)]
        project_dir: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Upgrade {
            target_version,
            target_blueprint_versions,
            force,
            skip_install,
            silent,
            verbose,
            registry_url,
            project_dir,
        } => {
            let renderer = Renderer::detect(silent);
            match run_upgrade(
                target_version.as_deref(),
                target_blueprint_versions.as_deref(),
                force,
                skip_install,
                silent,
                verbose,
                &registry_url,
                project_dir,
                renderer,
            ) {
                Ok(()) => ExitCode::SUCCESS,
                Err(message) => {
                    renderer.fatal(&message);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "reforge", &mut std::io::stdout());
            ExitCode::SUCCESS
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_upgrade(
    target_version: Option<&str>,
    target_blueprint_versions: Option<&str>,
    force: bool,
    skip_install: bool,
    silent: bool,
    verbose: bool,
    registry_url: &str,
    project_dir: Option<PathBuf>,
    renderer: Renderer,
) -> Result<(), String> {
    let map_err = |e: UpgradeError| e.to_string();

    let target = TargetSpec::parse(target_version).map_err(map_err)?;
    let blueprint_pins = parse_blueprint_specs(target_blueprint_versions).map_err(map_err)?;
    let project_dir = match project_dir {
        Some(dir) => dir,
        None => std::env::current_dir().map_err(|e| format!("cannot resolve current directory: {e}"))?,
    };

    let runner = SystemRunner::new(verbose && !silent);
    let vcs = GitCli::new(runner.clone(), &project_dir);
    let registry = HttpRegistry::new(registry_url).map_err(map_err)?;

    let orchestrator = UpgradeOrchestrator {
        runner: &runner,
        vcs: &vcs,
        registry: &registry,
        renderer,
        options: UpgradeOptions {
            target,
            blueprint_pins,
            force,
            skip_install,
            silent,
            project_dir,
        },
    };

    let outcome = orchestrator.run().map_err(|failure| failure.to_string())?;

    let mut lines = outcome_summary(&outcome).into_iter();
    if let Some(first) = lines.next() {
        renderer.ok(&first);
    }
    for line in lines {
        renderer.info(&line);
    }
    if !outcome.conflicts.is_empty() {
        renderer.warn(&format!(
            "please fix the conflicts listed below and commit:\n{}",
            outcome.conflicts.join("\n")
        ));
    }
    Ok(())
}

/// Closing status lines for a finished run: what was upgraded, whether a
/// prior interrupted run was resumed, and what is still left for the user
/// to do about dependencies.
fn outcome_summary(outcome: &UpgradeOutcome) -> Vec<String> {
    let mut lines = vec![format!(
        "upgraded from {} to {}",
        outcome.session.current_version,
        outcome.session.target_label()
    )];
    if !outcome.baseline_created {
        lines.push("resumed an upgrade that was already in progress".to_string());
    }
    if outcome.install_skipped {
        if outcome.manifest_conflicted {
            lines.push(
                "fix the dependency manifest conflicts, then install dependencies".to_string(),
            );
        } else {
            lines.push("dependency installation was skipped, run it once ready".to_string());
        }
    }
    lines
}
