use std::fs;
use std::path::{Path, PathBuf};

use reforge_core::UpgradeError;
use reforge_exec::{CommandRunner, RunOptions};
use reforge_vcs::Vcs;
use semver::Version;

use crate::install::DEPENDENCY_CACHE_DIR;

/// First generator version shipped with a dedicated `reforge` executable.
/// Older versions must be invoked through the generic `yo` front-end.
pub const FIRST_DEDICATED_CLI_VERSION: Version = Version::new(0, 9, 0);

// Pre-1.0 scaffolds kept entity definitions in a separate store; the
// generator needs an explicit flag to migrate them while regenerating.
const LEGACY_ENTITY_MAJOR: u64 = 0;

// Locally generated cryptographic material is never reproducible, so it is
// deleted before each regeneration commit to avoid spurious diffs.
const NON_REPRODUCIBLE_ARTIFACTS: &[&str] = &["src/main/resources/config/tls/keystore.p12"];

/// One regeneration run; not retained after use.
#[derive(Debug, Clone)]
pub struct RegenerationRequest {
    pub version: Version,
    /// Commit-message label: the plain version, or `global <version>`.
    pub version_label: String,
    pub plugin_info: String,
    pub is_target_run: bool,
    pub use_global_install: bool,
}

/// Invokes the external scaffolding generator with deterministic,
/// non-interactive flags and commits its output as a single snapshot.
pub struct RegenerationEngine<'a, R: CommandRunner, V: Vcs> {
    runner: &'a R,
    vcs: &'a V,
    root: PathBuf,
}

impl<'a, R: CommandRunner, V: Vcs> RegenerationEngine<'a, R, V> {
    pub fn new(runner: &'a R, vcs: &'a V, root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            vcs,
            root: root.into(),
        }
    }

    pub fn regenerate(&self, request: &RegenerationRequest) -> Result<(), UpgradeError> {
        self.generate(request)?;
        self.remove_non_reproducible_artifacts()?;
        self.vcs.commit_all(&format!(
            "Generated with reforge {}{}",
            request.version_label, request.plugin_info
        ))
    }

    fn generate(&self, request: &RegenerationRequest) -> Result<(), UpgradeError> {
        let (program, mut args) = self.generator_command(request)?;
        args.extend(
            [
                "--force",
                "--skip-install",
                "--skip-git",
                "--ignore-errors",
            ]
            .map(String::from),
        );
        if request.version.major == LEGACY_ENTITY_MAJOR && !request.is_target_run {
            args.push("--migrate-entities".to_string());
        }

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self
            .runner
            .run(&program, &arg_refs, &RunOptions::in_dir(&self.root))?;
        if !output.success() {
            return Err(UpgradeError::RegenerationFailed {
                exit_code: output.exit_code,
            });
        }
        Ok(())
    }

    // Selects how to shell to the generator for the requested version. The
    // global sentinel drops the local dependency cache first so the global
    // executable cannot pick up project-local modules.
    fn generator_command(
        &self,
        request: &RegenerationRequest,
    ) -> Result<(String, Vec<String>), UpgradeError> {
        if request.use_global_install {
            remove_path(&self.root.join(DEPENDENCY_CACHE_DIR))?;
            return Ok(("reforge".to_string(), Vec::new()));
        }
        if request.version < FIRST_DEDICATED_CLI_VERSION {
            return Ok(("yo".to_string(), vec!["reforge".to_string()]));
        }

        // Prefer the project-local executable; fall back to a package
        // manager exec shim when the bin directory cannot be resolved.
        let bin = self
            .runner
            .run("npm", &["bin"], &RunOptions::in_dir(&self.root))?;
        if bin.success() {
            let bin_dir = bin.stdout.trim();
            return Ok((format!("{bin_dir}/reforge"), Vec::new()));
        }
        Ok((
            "npm".to_string(),
            vec![
                "exec".to_string(),
                "--no".to_string(),
                "reforge".to_string(),
                "--".to_string(),
            ],
        ))
    }

    fn remove_non_reproducible_artifacts(&self) -> Result<(), UpgradeError> {
        for artifact in NON_REPRODUCIBLE_ARTIFACTS {
            remove_path(&self.root.join(artifact))?;
        }
        Ok(())
    }
}

fn remove_path(path: &Path) -> Result<(), UpgradeError> {
    if !path.exists() {
        return Ok(());
    }
    if path.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use reforge_core::UpgradeError;
    use reforge_exec::{CommandOutput, CommandRunner, RunOptions};
    use reforge_vcs::Vcs;
    use semver::Version;

    use super::{RegenerationEngine, RegenerationRequest};

    #[derive(Default)]
    struct FakeRunner {
        invocations: RefCell<Vec<String>>,
        generator_exit_code: i32,
        npm_bin_fails: bool,
    }

    impl FakeRunner {
        fn invocations(&self) -> Vec<String> {
            self.invocations.borrow().clone()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(
            &self,
            program: &str,
            args: &[&str],
            _options: &RunOptions,
        ) -> Result<CommandOutput, UpgradeError> {
            let line = if args.is_empty() {
                program.to_string()
            } else {
                format!("{} {}", program, args.join(" "))
            };
            self.invocations.borrow_mut().push(line);

            if program == "npm" && args == ["bin"] {
                return Ok(CommandOutput {
                    exit_code: if self.npm_bin_fails { 1 } else { 0 },
                    stdout: "/project/node_modules/.bin\n".to_string(),
                    stderr: String::new(),
                });
            }
            Ok(CommandOutput {
                exit_code: self.generator_exit_code,
                ..CommandOutput::default()
            })
        }
    }

    #[derive(Default)]
    struct FakeVcs {
        commits: RefCell<Vec<String>>,
    }

    impl Vcs for FakeVcs {
        fn tool_version(&self) -> Result<Version, UpgradeError> {
            Ok(Version::new(2, 39, 2))
        }
        fn is_inside_work_tree(&self) -> Result<bool, UpgradeError> {
            Ok(true)
        }
        fn init(&self) -> Result<(), UpgradeError> {
            Ok(())
        }
        fn current_branch(&self) -> Result<String, UpgradeError> {
            Ok("main".to_string())
        }
        fn branch_exists(&self, _branch: &str) -> Result<bool, UpgradeError> {
            Ok(false)
        }
        fn checkout(&self, _branch: &str, _force: bool) -> Result<(), UpgradeError> {
            Ok(())
        }
        fn checkout_orphan(&self, _branch: &str) -> Result<(), UpgradeError> {
            Ok(())
        }
        fn commit_all(&self, message: &str) -> Result<(), UpgradeError> {
            self.commits.borrow_mut().push(message.to_string());
            Ok(())
        }
        fn merge_ours(&self, _branch: &str, _allow: bool) -> Result<(), UpgradeError> {
            Ok(())
        }
        fn merge(&self, _branch: &str) -> Result<CommandOutput, UpgradeError> {
            Ok(CommandOutput::default())
        }
        fn conflicted_files(&self, _pathspec: Option<&str>) -> Result<Vec<String>, UpgradeError> {
            Ok(Vec::new())
        }
        fn status_porcelain(&self) -> Result<String, UpgradeError> {
            Ok(String::new())
        }
    }

    fn request(version: &str, is_target_run: bool) -> RegenerationRequest {
        RegenerationRequest {
            version: Version::parse(version).expect("test version"),
            version_label: version.to_string(),
            plugin_info: String::new(),
            is_target_run,
            use_global_install: false,
        }
    }

    #[test]
    fn regenerates_through_local_executable_with_deterministic_flags() {
        let root = test_root();
        let runner = FakeRunner::default();
        let vcs = FakeVcs::default();
        let engine = RegenerationEngine::new(&runner, &vcs, &root);

        engine
            .regenerate(&request("1.1.0", true))
            .expect("must regenerate");

        let invocations = runner.invocations();
        assert_eq!(invocations[0], "npm bin");
        assert_eq!(
            invocations[1],
            "/project/node_modules/.bin/reforge --force --skip-install --skip-git --ignore-errors"
        );
        assert_eq!(
            vcs.commits.borrow().as_slice(),
            ["Generated with reforge 1.1.0"]
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn falls_back_to_package_manager_exec_when_bin_lookup_fails() {
        let root = test_root();
        let runner = FakeRunner {
            npm_bin_fails: true,
            ..FakeRunner::default()
        };
        let vcs = FakeVcs::default();
        let engine = RegenerationEngine::new(&runner, &vcs, &root);

        engine
            .regenerate(&request("1.1.0", true))
            .expect("must regenerate");

        assert!(runner.invocations()[1].starts_with("npm exec --no reforge --"));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn versions_before_the_dedicated_cli_use_the_generic_front_end() {
        let root = test_root();
        let runner = FakeRunner::default();
        let vcs = FakeVcs::default();
        let engine = RegenerationEngine::new(&runner, &vcs, &root);

        engine
            .regenerate(&request("0.8.0", true))
            .expect("must regenerate");

        assert!(runner.invocations()[0].starts_with("yo reforge --force"));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn legacy_baseline_run_passes_the_entity_migration_flag() {
        let root = test_root();
        let runner = FakeRunner::default();
        let vcs = FakeVcs::default();
        let engine = RegenerationEngine::new(&runner, &vcs, &root);

        engine
            .regenerate(&request("0.8.0", false))
            .expect("must regenerate");
        assert!(runner.invocations()[0].ends_with("--migrate-entities"));

        // The target run never migrates entities again.
        engine
            .regenerate(&request("0.8.0", true))
            .expect("must regenerate");
        assert!(!runner
            .invocations()
            .last()
            .expect("must have invocations")
            .contains("--migrate-entities"));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn global_install_drops_the_dependency_cache_and_uses_the_global_executable() {
        let root = test_root();
        fs::create_dir_all(root.join("node_modules")).expect("must create cache");
        let runner = FakeRunner::default();
        let vcs = FakeVcs::default();
        let engine = RegenerationEngine::new(&runner, &vcs, &root);

        let mut request = request("0.4.0", true);
        request.use_global_install = true;
        request.version_label = "global 0.4.0".to_string();
        engine.regenerate(&request).expect("must regenerate");

        assert!(!root.join("node_modules").exists());
        assert!(runner.invocations()[0].starts_with("reforge --force"));
        assert_eq!(
            vcs.commits.borrow().as_slice(),
            ["Generated with reforge global 0.4.0"]
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn keystore_artifact_is_removed_before_the_commit() {
        let root = test_root();
        let keystore = root.join("src/main/resources/config/tls/keystore.p12");
        fs::create_dir_all(keystore.parent().expect("keystore parent"))
            .expect("must create keystore dir");
        fs::write(&keystore, [0u8; 4]).expect("must write keystore");

        let runner = FakeRunner::default();
        let vcs = FakeVcs::default();
        let engine = RegenerationEngine::new(&runner, &vcs, &root);
        engine
            .regenerate(&request("1.1.0", true))
            .expect("must regenerate");

        assert!(!keystore.exists(), "keystore must never reach the commit");
        assert_eq!(vcs.commits.borrow().len(), 1);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn generator_failure_is_regeneration_failed_with_the_exit_code() {
        let root = test_root();
        let runner = FakeRunner {
            generator_exit_code: 2,
            ..FakeRunner::default()
        };
        let vcs = FakeVcs::default();
        let engine = RegenerationEngine::new(&runner, &vcs, &root);

        let err = engine
            .regenerate(&request("1.1.0", true))
            .expect_err("must fail");
        match err {
            UpgradeError::RegenerationFailed { exit_code } => assert_eq!(exit_code, 2),
            other => panic!("expected RegenerationFailed, got {other:?}"),
        }
        assert!(vcs.commits.borrow().is_empty(), "no commit after failure");

        let _ = fs::remove_dir_all(&root);
    }

    fn test_root() -> PathBuf {
        let mut path = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        path.push(format!(
            "reforge-regen-tests-{}-{}",
            std::process::id(),
            nanos
        ));
        fs::create_dir_all(&path).expect("must create test root");
        path
    }
}
