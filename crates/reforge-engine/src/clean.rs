use std::fs;
use std::path::Path;

use reforge_core::{UpgradeError, CONFIG_FILE, STATE_DIR};

use crate::install::DEPENDENCY_CACHE_DIR;

// Always survive a cleanup: project metadata, internal tool state, the
// dependency cache, version control, and editor/build-tool folders.
const ALWAYS_RETAINED: &[&str] = &[
    CONFIG_FILE,
    STATE_DIR,
    DEPENDENCY_CACHE_DIR,
    ".git",
    ".idea",
    ".mvn",
];

/// Removes every top-level entry not on the retain-list, which is the union
/// of [`ALWAYS_RETAINED`] and the project's ignore-rule patterns. This is
/// what makes regeneration idempotent and focused on framework-owned files.
/// Returns the removed entry names.
pub fn clean_working_tree(root: &Path) -> Result<Vec<String>, UpgradeError> {
    let mut retained: Vec<String> = ALWAYS_RETAINED.iter().map(|s| s.to_string()).collect();
    retained.extend(read_ignore_patterns(root)?);

    let mut removed = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if retained.iter().any(|keep| *keep == name) {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        removed.push(name);
    }
    removed.sort();
    Ok(removed)
}

// Entry names named by `.gitignore` are treated as not framework-owned.
// Comments and negations are skipped; directory slashes are stripped so the
// pattern compares against the bare entry name.
fn read_ignore_patterns(root: &Path) -> Result<Vec<String>, UpgradeError> {
    let path = root.join(".gitignore");
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(&path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .map(|line| line.trim_matches('/').to_string())
        .collect())
}
