use std::fs;
use std::path::Path;

use reforge_core::UpgradeError;
use reforge_exec::{CommandRunner, RunOptions};
use semver::Version;

/// Project-local dependency cache, retained across cleanups and rebuilt by
/// the final install step.
pub const DEPENDENCY_CACHE_DIR: &str = "node_modules";

/// Installs one package at an exact version into the project, without
/// touching the lockfile or running install scripts, so the only observable
/// effect is the package being available for the next regeneration.
pub fn install_package_locally(
    runner: &dyn CommandRunner,
    root: &Path,
    package_manager: &str,
    package: &str,
    version: &Version,
) -> Result<(), UpgradeError> {
    let spec = format!("{package}@{version}");
    runner.run_checked(
        package_manager,
        &[
            "install",
            &spec,
            "--save-dev",
            "--no-package-lock",
            "--ignore-scripts",
            "--force",
        ],
        &RunOptions::in_dir(root),
    )?;
    Ok(())
}

/// Final dependency installation: the cache is dropped first so the install
/// reflects the merged manifest, not leftovers from either branch.
pub fn install_project_dependencies(
    runner: &dyn CommandRunner,
    root: &Path,
    package_manager: &str,
) -> Result<(), UpgradeError> {
    let cache = root.join(DEPENDENCY_CACHE_DIR);
    if cache.exists() {
        fs::remove_dir_all(&cache)?;
    }
    runner.run_checked(package_manager, &["install"], &RunOptions::in_dir(root))?;
    Ok(())
}
