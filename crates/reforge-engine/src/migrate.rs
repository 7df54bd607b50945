use std::fs;
use std::path::Path;

use reforge_core::{UpgradeError, CONFIG_FILE};
use semver::Version;

/// Metadata file written by pre-1.0 generators, superseded by
/// [`CONFIG_FILE`].
pub const LEGACY_RC_FILE: &str = ".reforge-rc.json";

/// Interim file migrations run on the isolation branch before the target
/// regeneration, gated on the version the project is coming from. Returns
/// whether anything changed; the caller commits the preparation step.
pub fn apply_interim_migrations(root: &Path, current: &Version) -> Result<bool, UpgradeError> {
    let mut applied = false;
    if current.major == 0 {
        applied |= migrate_legacy_rc_file(root)?;
    }
    Ok(applied)
}

// Pre-1.0 projects carried their metadata under the legacy rc name; the
// target generator only reads the current one.
fn migrate_legacy_rc_file(root: &Path) -> Result<bool, UpgradeError> {
    let legacy = root.join(LEGACY_RC_FILE);
    let current = root.join(CONFIG_FILE);
    if !legacy.exists() || current.exists() {
        return Ok(false);
    }
    fs::rename(&legacy, &current)?;
    Ok(true)
}
