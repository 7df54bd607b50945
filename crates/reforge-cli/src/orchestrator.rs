use std::path::PathBuf;

use reforge_core::{
    ProjectConfig, TargetSpec, UpgradeError, UpgradeSession, GENERATOR_PACKAGE, MANIFEST_FILE,
};
use reforge_engine::{
    apply_interim_migrations, clean_working_tree, install_package_locally,
    install_project_dependencies, RegenerationEngine, RegenerationRequest,
};
use reforge_exec::{CommandRunner, RunOptions};
use reforge_registry::{RegistryClient, VersionResolver};
use reforge_vcs::{BranchLifecycle, Vcs, UPGRADE_BRANCH};
use semver::Version;

use crate::render::Renderer;

/// Fatal abort, carrying which phase gave up. The branch state left behind
/// is the retry mechanism: the user fixes the underlying condition and
/// re-invokes, and the workflow resumes from the correct point.
#[derive(Debug)]
pub struct PhaseFailure {
    pub phase: &'static str,
    pub source: UpgradeError,
}

impl std::fmt::Display for PhaseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upgrade failed during '{}': {}", self.phase, self.source)
    }
}

impl std::error::Error for PhaseFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(Debug, Clone)]
pub struct UpgradeOptions {
    pub target: TargetSpec,
    pub blueprint_pins: Vec<(String, Version)>,
    pub force: bool,
    pub skip_install: bool,
    pub silent: bool,
    pub project_dir: PathBuf,
}

/// What the run produced. Conflicts are expected manual-resolution work,
/// never a failure.
#[derive(Debug)]
pub struct UpgradeOutcome {
    pub session: UpgradeSession,
    pub baseline_created: bool,
    pub manifest_conflicted: bool,
    pub install_skipped: bool,
    pub conflicts: Vec<String>,
}

/// Top-level state machine sequencing the upgrade: baseline capture,
/// regenerate at the old version (first run only), regenerate at the new
/// version, merge back, conflict report. Working-tree mutations are
/// strictly serialized; only registry lookups fan out.
pub struct UpgradeOrchestrator<'a, R: CommandRunner, V: Vcs> {
    pub runner: &'a R,
    pub vcs: &'a V,
    pub registry: &'a dyn RegistryClient,
    pub renderer: Renderer,
    pub options: UpgradeOptions,
}

fn phase<T>(
    name: &'static str,
    f: impl FnOnce() -> Result<T, UpgradeError>,
) -> Result<T, PhaseFailure> {
    f().map_err(|source| PhaseFailure {
        phase: name,
        source,
    })
}

impl<'a, R: CommandRunner, V: Vcs> UpgradeOrchestrator<'a, R, V> {
    pub fn run(&self) -> Result<UpgradeOutcome, PhaseFailure> {
        let root = self.options.project_dir.clone();
        let lifecycle = BranchLifecycle::new(self.vcs);
        let engine = RegenerationEngine::new(self.runner, self.vcs, &root);
        let renderer = self.renderer;

        let (config, mut session) = phase("resolve-versions", || {
            let config = ProjectConfig::load(&root)?;
            let mut session = UpgradeSession::new(
                VersionResolver::resolve_current(&config),
                self.options.force,
                self.options.skip_install,
                self.options.silent,
            );

            let own_version = Version::parse(env!("CARGO_PKG_VERSION")).map_err(|e| {
                UpgradeError::Environment(format!("invalid build version metadata: {e}"))
            })?;
            let resolver = VersionResolver::new(self.registry, own_version);
            let (target, using_global) = resolver.resolve_target(&self.options.target)?;
            session.target_version = target;
            session.using_global_install = using_global;

            for (name, version) in &self.options.blueprint_pins {
                if config.blueprints.iter().any(|decl| decl.name == *name) {
                    renderer.warn(&format!(
                        "blueprint {name} will be upgraded to pinned version {version}"
                    ));
                }
            }
            session.plugins =
                resolver.resolve_plugins(&config.blueprints, &self.options.blueprint_pins)?;

            VersionResolver::ensure_update_available(
                &session.current_version,
                &session.target_version,
                &session.plugins,
                session.force,
            )?;
            Ok((config, session))
        })?;
        renderer.ok(&format!(
            "upgrading from {} to {}{}",
            session.current_version,
            session.target_label(),
            session.plugin_info(true)
        ));

        phase("check-environment", || {
            self.vcs.tool_version().map_err(|e| {
                UpgradeError::Environment(format!("git is required for upgrading: {e}"))
            })?;
            let probe = self.runner.run(
                &config.package_manager,
                &["--version"],
                &RunOptions::in_dir(&root),
            )?;
            if !probe.success() {
                return Err(UpgradeError::Environment(format!(
                    "package manager '{}' is not usable: {}",
                    config.package_manager,
                    probe.stderr.trim()
                )));
            }
            Ok(())
        })?;

        phase("prepare-repository", || {
            if lifecycle.ensure_repository()? {
                renderer.ok("initialized a new git repository");
            } else {
                renderer.ok("git repository detected");
            }
            lifecycle.assert_clean_tree()?;
            session.source_branch = lifecycle.source_branch()?;
            Ok(())
        })?;

        let baseline_created = phase("establish-baseline", || {
            let plugin_info = session.plugin_info(false);
            lifecycle.ensure_baseline(&session.source_branch, &session.current_version, || {
                clean_working_tree(&root)?;
                install_package_locally(
                    self.runner,
                    &root,
                    &config.package_manager,
                    GENERATOR_PACKAGE,
                    &session.current_version,
                )?;
                for plugin in &session.plugins {
                    install_package_locally(
                        self.runner,
                        &root,
                        &config.package_manager,
                        &plugin.name,
                        &plugin.current_version,
                    )?;
                }
                let spinner = renderer
                    .start_spinner(&format!("regenerating at {}", session.current_version));
                let result = engine.regenerate(&RegenerationRequest {
                    version: session.current_version.clone(),
                    version_label: session.current_version.to_string(),
                    plugin_info: plugin_info.clone(),
                    is_target_run: false,
                    use_global_install: false,
                });
                renderer.finish_spinner(spinner);
                result
            })
        })?;
        if baseline_created {
            renderer.ok(&format!(
                "recorded that current code was generated with {}",
                session.current_version
            ));
        } else {
            renderer.ok("isolation branch already exists, resuming");
        }

        phase("checkout-isolation", || {
            self.vcs.checkout(UPGRADE_BRANCH, false)
        })?;

        phase("update-tooling", || {
            if !session.using_global_install {
                install_package_locally(
                    self.runner,
                    &root,
                    &config.package_manager,
                    GENERATOR_PACKAGE,
                    &session.target_version,
                )?;
            }
            for plugin in &session.plugins {
                if let Some(target) = &plugin.target_version {
                    install_package_locally(
                        self.runner,
                        &root,
                        &config.package_manager,
                        &plugin.name,
                        target,
                    )?;
                }
            }
            Ok(())
        })?;

        phase("apply-migrations", || {
            if apply_interim_migrations(&root, &session.current_version)? {
                self.vcs.commit_all("Upgrade preparation.")?;
                renderer.ok("upgrade preparation committed");
            }
            Ok(())
        })?;

        phase("regenerate-target", || {
            clean_working_tree(&root)?;
            let spinner =
                renderer.start_spinner(&format!("regenerating at {}", session.target_label()));
            let result = engine.regenerate(&RegenerationRequest {
                version: session.target_version.clone(),
                version_label: session.target_label(),
                plugin_info: session.plugin_info(true),
                is_target_run: true,
                use_global_install: session.using_global_install,
            });
            renderer.finish_spinner(spinner);
            result
        })?;

        phase("checkout-source", || {
            self.vcs.checkout(&session.source_branch, true)
        })?;

        let merge_report = phase("merge-back", || lifecycle.merge_isolation_into_source())?;
        if merge_report.is_clean() {
            renderer.ok(&format!(
                "merged {UPGRADE_BRANCH} back into {}",
                session.source_branch
            ));
        } else {
            renderer.warn(&format!(
                "merge completed with {} conflicted file(s)",
                merge_report.conflicts.len()
            ));
        }

        let manifest_conflicted = phase("check-manifest-conflicts", || {
            Ok(!self.vcs.conflicted_files(Some(MANIFEST_FILE))?.is_empty())
        })?;
        let mut install_skipped = session.skip_install;
        if manifest_conflicted {
            renderer.warn(&format!(
                "there are conflicts in {MANIFEST_FILE}, please fix them and then run '{} install'",
                config.package_manager
            ));
            install_skipped = true;
        }

        phase("install-dependencies", || {
            if install_skipped {
                renderer.info(&format!(
                    "skipping dependency installation, run '{} install' once ready",
                    config.package_manager
                ));
                return Ok(());
            }
            let spinner = renderer.start_spinner("installing dependencies");
            let result = install_project_dependencies(self.runner, &root, &config.package_manager);
            renderer.finish_spinner(spinner);
            result
        })?;

        let conflicts = phase("final-conflict-scan", || self.vcs.conflicted_files(None))?;

        Ok(UpgradeOutcome {
            session,
            baseline_created,
            manifest_conflicted,
            install_skipped,
            conflicts,
        })
    }
}
