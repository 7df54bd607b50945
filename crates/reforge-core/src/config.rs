use std::fs;
use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::UpgradeError;

/// Persisted project metadata, written by the generator at scaffold time.
pub const CONFIG_FILE: &str = ".reforge.json";

/// Internal per-entity state directory, also generator-owned.
pub const STATE_DIR: &str = ".reforge";

/// Dependency manifest consumed by the package manager. A conflicted
/// manifest after merge-back blocks the install step.
pub const MANIFEST_FILE: &str = "package.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub generator_version: Version,
    pub base_name: String,
    #[serde(default = "default_package_manager")]
    pub package_manager: String,
    #[serde(default)]
    pub blueprints: Vec<BlueprintDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintDecl {
    pub name: String,
    pub version: Version,
}

fn default_package_manager() -> String {
    "npm".to_string()
}

impl ProjectConfig {
    /// Loads the project configuration from `<root>/.reforge.json`. A missing
    /// file, unparseable content, or an empty `baseName` all mean "not a
    /// recognized project" and there is nothing to upgrade.
    pub fn load(root: &Path) -> Result<Self, UpgradeError> {
        let path = root.join(CONFIG_FILE);
        let content = fs::read_to_string(&path).map_err(|e| {
            UpgradeError::Configuration(format!(
                "could not find a valid project configuration, check that '{}' exists: {e}",
                path.display()
            ))
        })?;
        let config: ProjectConfig = serde_json::from_str(&content).map_err(|e| {
            UpgradeError::Configuration(format!(
                "invalid project configuration '{}': {e}",
                path.display()
            ))
        })?;
        if config.base_name.trim().is_empty() {
            return Err(UpgradeError::Configuration(
                "current directory does not contain a recognized project: 'baseName' is empty"
                    .to_string(),
            ));
        }
        Ok(config)
    }
}
