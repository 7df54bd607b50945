use reforge_core::{
    BlueprintDecl, Plugin, ProjectConfig, TargetSpec, UpgradeError, GENERATOR_PACKAGE,
};
use semver::Version;

use crate::RegistryClient;

/// Bound on the plugin lookup fan-out; lookups are independent of the
/// working tree and of each other.
pub const MAX_CONCURRENT_LOOKUPS: usize = 4;

/// Resolves current, target, and per-plugin versions. Read-only: resolution
/// happens before any working-tree mutation.
pub struct VersionResolver<'a> {
    registry: &'a dyn RegistryClient,
    /// This tool's own released version, which the `global` sentinel
    /// resolves to for bookkeeping.
    own_version: Version,
}

impl<'a> VersionResolver<'a> {
    pub fn new(registry: &'a dyn RegistryClient, own_version: Version) -> Self {
        Self {
            registry,
            own_version,
        }
    }

    /// The currently installed generator version. Loading the project
    /// configuration already failed with `Configuration` when there was no
    /// recognized project at all.
    pub fn resolve_current(config: &ProjectConfig) -> Version {
        config.generator_version.clone()
    }

    /// Resolves the primary target. Returns the version and whether the
    /// `global` sentinel was used. A registry failure is fatal; there is no
    /// silent fallback to the current version.
    pub fn resolve_target(&self, spec: &TargetSpec) -> Result<(Version, bool), UpgradeError> {
        match spec {
            TargetSpec::Exact(version) => Ok((version.clone(), false)),
            TargetSpec::Global => Ok((self.own_version.clone(), true)),
            TargetSpec::Latest => {
                let latest = self.registry.latest_version(GENERATOR_PACKAGE)?;
                Ok((latest, false))
            }
        }
    }

    /// Resolves a target version for every declared plugin. Pinned plugins
    /// skip the network entirely; the rest fan out with bounded
    /// concurrency. A single lookup failure never cancels siblings: all
    /// outcomes are collected, then failures are reported as one aggregate.
    pub fn resolve_plugins(
        &self,
        declared: &[BlueprintDecl],
        pins: &[(String, Version)],
    ) -> Result<Vec<Plugin>, UpgradeError> {
        let mut plugins: Vec<Plugin> = declared
            .iter()
            .map(|decl| Plugin {
                name: decl.name.clone(),
                current_version: decl.version.clone(),
                target_version: pins
                    .iter()
                    .find(|(name, _)| *name == decl.name)
                    .map(|(_, version)| version.clone()),
            })
            .collect();
        plugins.sort_by(|a, b| a.name.cmp(&b.name));

        let unresolved: Vec<String> = plugins
            .iter()
            .filter(|plugin| plugin.target_version.is_none())
            .map(|plugin| plugin.name.clone())
            .collect();
        if unresolved.is_empty() {
            return Ok(plugins);
        }

        let mut outcomes: Vec<(String, Result<Version, String>)> = Vec::new();
        for chunk in unresolved.chunks(MAX_CONCURRENT_LOOKUPS) {
            let chunk_outcomes = std::thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|name| {
                        scope.spawn(move || {
                            let result = self
                                .registry
                                .latest_version(name)
                                .map_err(|e| e.to_string());
                            (name.clone(), result)
                        })
                    })
                    .collect();
                chunk
                    .iter()
                    .zip(handles)
                    .map(|(name, handle)| match handle.join() {
                        Ok(outcome) => outcome,
                        Err(_) => (name.clone(), Err("lookup thread panicked".to_string())),
                    })
                    .collect::<Vec<_>>()
            });
            outcomes.extend(chunk_outcomes);
        }

        let mut failures: Vec<(String, String)> = Vec::new();
        for (name, result) in outcomes {
            match result {
                Ok(version) => {
                    if let Some(plugin) = plugins.iter_mut().find(|p| p.name == name) {
                        plugin.target_version = Some(version);
                    }
                }
                Err(message) => failures.push((name, message)),
            }
        }
        if !failures.is_empty() {
            failures.sort_by(|a, b| a.0.cmp(&b.0));
            return Err(UpgradeError::PluginLookupsFailed(failures));
        }
        Ok(plugins)
    }

    /// Upgrading a project already at the latest version is a user error,
    /// not a no-op success. Fails only when neither the primary target nor
    /// any plugin target is strictly newer, unless forced.
    pub fn ensure_update_available(
        current: &Version,
        target: &Version,
        plugins: &[Plugin],
        force: bool,
    ) -> Result<(), UpgradeError> {
        if force {
            return Ok(());
        }
        let primary_newer = target > current;
        let plugin_newer = plugins.iter().any(Plugin::has_newer_target);
        if !primary_newer && !plugin_newer {
            return Err(UpgradeError::NoUpdateAvailable);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use reforge_core::{BlueprintDecl, Plugin, TargetSpec, UpgradeError, GENERATOR_PACKAGE};
    use semver::Version;

    use super::VersionResolver;
    use crate::RegistryClient;

    struct FakeRegistry {
        latest: Vec<(&'static str, &'static str)>,
        failing: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeRegistry {
        fn new(latest: Vec<(&'static str, &'static str)>) -> Self {
            Self {
                latest,
                failing: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            let mut calls = self.calls.lock().expect("calls lock").clone();
            calls.sort();
            calls
        }
    }

    impl RegistryClient for FakeRegistry {
        fn latest_version(&self, package: &str) -> Result<Version, UpgradeError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(package.to_string());
            if self.failing.contains(&package) {
                return Err(UpgradeError::Network {
                    package: package.to_string(),
                    message: "connection refused".to_string(),
                });
            }
            self.latest
                .iter()
                .find(|(name, _)| *name == package)
                .map(|(_, version)| Version::parse(version).expect("test version"))
                .ok_or_else(|| UpgradeError::Network {
                    package: package.to_string(),
                    message: "not found".to_string(),
                })
        }
    }

    fn decl(name: &str, version: &str) -> BlueprintDecl {
        BlueprintDecl {
            name: name.to_string(),
            version: Version::parse(version).expect("test version"),
        }
    }

    #[test]
    fn explicit_target_is_used_verbatim_without_network() {
        let registry = FakeRegistry::new(vec![]);
        let resolver = VersionResolver::new(&registry, Version::new(0, 4, 0));
        let (version, global) = resolver
            .resolve_target(&TargetSpec::Exact(Version::new(1, 1, 0)))
            .expect("must resolve");
        assert_eq!(version, Version::new(1, 1, 0));
        assert!(!global);
        assert!(registry.calls().is_empty());
    }

    #[test]
    fn global_sentinel_resolves_to_own_version() {
        let registry = FakeRegistry::new(vec![]);
        let resolver = VersionResolver::new(&registry, Version::new(0, 4, 0));
        let (version, global) = resolver
            .resolve_target(&TargetSpec::Global)
            .expect("must resolve");
        assert_eq!(version, Version::new(0, 4, 0));
        assert!(global);
        assert!(registry.calls().is_empty());
    }

    #[test]
    fn latest_target_is_fetched_from_the_registry() {
        let registry = FakeRegistry::new(vec![(GENERATOR_PACKAGE, "1.1.0")]);
        let resolver = VersionResolver::new(&registry, Version::new(0, 4, 0));
        let (version, global) = resolver
            .resolve_target(&TargetSpec::Latest)
            .expect("must resolve");
        assert_eq!(version, Version::new(1, 1, 0));
        assert!(!global);
        assert_eq!(registry.calls(), vec![GENERATOR_PACKAGE.to_string()]);
    }

    #[test]
    fn primary_lookup_failure_is_fatal_with_no_fallback() {
        let registry = FakeRegistry {
            failing: vec![GENERATOR_PACKAGE],
            ..FakeRegistry::new(vec![])
        };
        let resolver = VersionResolver::new(&registry, Version::new(0, 4, 0));
        let err = resolver
            .resolve_target(&TargetSpec::Latest)
            .expect_err("must fail");
        assert!(matches!(err, UpgradeError::Network { .. }));
    }

    #[test]
    fn pinned_plugin_skips_the_network_lookup() {
        let registry = FakeRegistry::new(vec![]);
        let resolver = VersionResolver::new(&registry, Version::new(0, 4, 0));

        let plugins = resolver
            .resolve_plugins(
                &[decl("foo", "0.1.0")],
                &[("foo".to_string(), Version::new(0, 2, 0))],
            )
            .expect("must resolve pinned plugin");

        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].target_version, Some(Version::new(0, 2, 0)));
        assert!(registry.calls().is_empty(), "pin must not hit the network");
    }

    #[test]
    fn unpinned_plugins_resolve_to_registry_latest_sorted_by_name() {
        let registry = FakeRegistry::new(vec![("zeta", "2.0.0"), ("alpha", "0.2.0")]);
        let resolver = VersionResolver::new(&registry, Version::new(0, 4, 0));

        let plugins = resolver
            .resolve_plugins(&[decl("zeta", "1.0.0"), decl("alpha", "0.1.0")], &[])
            .expect("must resolve plugins");

        let names: Vec<&str> = plugins.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(plugins[0].target_version, Some(Version::new(0, 2, 0)));
        assert_eq!(plugins[1].target_version, Some(Version::new(2, 0, 0)));
    }

    #[test]
    fn one_failed_lookup_does_not_cancel_siblings_and_aggregates() {
        let registry = FakeRegistry {
            failing: vec!["bar", "baz"],
            ..FakeRegistry::new(vec![("foo", "0.2.0")])
        };
        let resolver = VersionResolver::new(&registry, Version::new(0, 4, 0));

        let err = resolver
            .resolve_plugins(
                &[decl("foo", "0.1.0"), decl("bar", "0.1.0"), decl("baz", "0.1.0")],
                &[],
            )
            .expect_err("must aggregate failures");

        match err {
            UpgradeError::PluginLookupsFailed(failures) => {
                let names: Vec<&str> = failures.iter().map(|(name, _)| name.as_str()).collect();
                assert_eq!(names, vec!["bar", "baz"]);
            }
            other => panic!("expected PluginLookupsFailed, got {other:?}"),
        }
        // Every sibling lookup was still attempted.
        assert_eq!(registry.calls(), vec!["bar", "baz", "foo"]);
    }

    #[test]
    fn newer_target_passes_the_update_policy() {
        VersionResolver::ensure_update_available(
            &Version::new(1, 0, 0),
            &Version::new(1, 1, 0),
            &[],
            false,
        )
        .expect("strictly newer target must pass");
    }

    #[test]
    fn equal_target_without_force_is_no_update_available() {
        let err = VersionResolver::ensure_update_available(
            &Version::new(1, 0, 0),
            &Version::new(1, 0, 0),
            &[],
            false,
        )
        .expect_err("must fail without force");
        assert!(matches!(err, UpgradeError::NoUpdateAvailable));
    }

    #[test]
    fn equal_target_with_force_proceeds() {
        VersionResolver::ensure_update_available(
            &Version::new(1, 0, 0),
            &Version::new(1, 0, 0),
            &[],
            true,
        )
        .expect("force must bypass the policy");
    }

    #[test]
    fn plugin_with_newer_target_rescues_an_equal_primary() {
        let plugins = vec![Plugin {
            name: "foo".to_string(),
            current_version: Version::new(0, 1, 0),
            target_version: Some(Version::new(0, 2, 0)),
        }];
        VersionResolver::ensure_update_available(
            &Version::new(1, 0, 0),
            &Version::new(1, 0, 0),
            &plugins,
            false,
        )
        .expect("a strictly newer plugin target must count as an update");
    }
}
