use semver::Version;

use crate::Plugin;

/// Mutable state threaded through an upgrade run. Each phase reads the
/// fields it needs and fills the ones it produces; the durable record of an
/// upgrade is the git history it leaves behind, never this struct.
#[derive(Debug, Clone)]
pub struct UpgradeSession {
    pub source_branch: String,
    pub current_version: Version,
    pub target_version: Version,
    pub plugins: Vec<Plugin>,
    pub force: bool,
    pub skip_install: bool,
    pub silent: bool,
    /// Set when the target was the `global` sentinel: regeneration shells to
    /// the globally installed generator instead of a project-local one.
    pub using_global_install: bool,
}

impl UpgradeSession {
    pub fn new(current_version: Version, force: bool, skip_install: bool, silent: bool) -> Self {
        Self {
            source_branch: String::new(),
            target_version: current_version.clone(),
            current_version,
            plugins: Vec::new(),
            force,
            skip_install,
            silent,
            using_global_install: false,
        }
    }

    /// Label used for commit messages and regeneration logging: the plain
    /// target version, or `global <version>` when the sentinel was used.
    pub fn target_label(&self) -> String {
        if self.using_global_install {
            format!("global {}", self.target_version)
        } else {
            self.target_version.to_string()
        }
    }

    /// Human-readable summary of plugin targets, stable across runs (plugins
    /// are kept sorted by name).
    pub fn plugin_info(&self, use_targets: bool) -> String {
        if self.plugins.is_empty() {
            return String::new();
        }
        let rendered = self
            .plugins
            .iter()
            .map(|plugin| {
                let version = if use_targets {
                    plugin
                        .target_version
                        .as_ref()
                        .unwrap_or(&plugin.current_version)
                } else {
                    &plugin.current_version
                };
                format!("{}@{}", plugin.name, version)
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(" and {rendered}")
    }
}
