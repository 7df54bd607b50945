use semver::Version;

use crate::UpgradeError;

/// Registry package that holds the scaffolding generator itself.
pub const GENERATOR_PACKAGE: &str = "reforge-generator";

/// Requested target for the primary generator version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// Fetch the latest published version from the registry.
    Latest,
    /// Use whatever generator is installed globally instead of a
    /// project-local install.
    Global,
    Exact(Version),
}

impl TargetSpec {
    pub fn parse(input: Option<&str>) -> Result<Self, UpgradeError> {
        let Some(input) = input else {
            return Ok(TargetSpec::Latest);
        };
        match input.trim() {
            "" | "latest" => Ok(TargetSpec::Latest),
            "global" => Ok(TargetSpec::Global),
            exact => Version::parse(exact).map(TargetSpec::Exact).map_err(|e| {
                UpgradeError::Configuration(format!("invalid target version '{exact}': {e}"))
            }),
        }
    }
}

/// A blueprint package that customizes the generator, versioned
/// independently of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plugin {
    pub name: String,
    pub current_version: Version,
    /// Filled by resolution: an explicit pin or the registry's latest.
    pub target_version: Option<Version>,
}

impl Plugin {
    pub fn has_newer_target(&self) -> bool {
        self.target_version
            .as_ref()
            .is_some_and(|target| *target > self.current_version)
    }
}

/// Parses `name@version` pairs from a comma-separated list, e.g.
/// `foo@0.0.1,bar@1.0.2`. A bare `name` or `name@latest` pins nothing.
pub fn parse_blueprint_specs(input: Option<&str>) -> Result<Vec<(String, Version)>, UpgradeError> {
    let Some(input) = input else {
        return Ok(Vec::new());
    };

    let mut pins = Vec::new();
    for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((name, version)) = entry.split_once('@') else {
            continue;
        };
        if name.is_empty() {
            return Err(UpgradeError::Configuration(format!(
                "invalid blueprint spec '{entry}': missing package name"
            )));
        }
        if version == "latest" {
            continue;
        }
        let version = Version::parse(version).map_err(|e| {
            UpgradeError::Configuration(format!(
                "invalid blueprint spec '{entry}': bad version: {e}"
            ))
        })?;
        pins.push((name.to_string(), version));
    }
    pins.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(pins)
}
