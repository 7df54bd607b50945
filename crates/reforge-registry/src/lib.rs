mod resolver;

use std::time::Duration;

use reforge_core::UpgradeError;
use semver::Version;
use serde::Deserialize;

pub use resolver::{VersionResolver, MAX_CONCURRENT_LOOKUPS};

/// Package registry lookup. Lookups never mutate the working tree and may
/// run concurrently, so implementations must be shareable across threads.
pub trait RegistryClient: Sync {
    fn latest_version(&self, package: &str) -> Result<Version, UpgradeError>;
}

pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct LatestDocument {
    version: Version,
}

/// Blocking HTTP client against an npm-style registry: the latest published
/// version of a package lives at `{base}/{package}/latest`.
pub struct HttpRegistry {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpRegistry {
    pub fn new(base_url: impl Into<String>) -> Result<Self, UpgradeError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .map_err(|e| UpgradeError::Environment(format!("failed building HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl RegistryClient for HttpRegistry {
    fn latest_version(&self, package: &str) -> Result<Version, UpgradeError> {
        let url = format!("{}/{}/latest", self.base_url, package);
        let network_error = |message: String| UpgradeError::Network {
            package: package.to_string(),
            message,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| network_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(network_error(format!(
                "registry returned {} for {url}",
                response.status()
            )));
        }

        let body = response
            .text()
            .map_err(|e| network_error(e.to_string()))?;
        let document: LatestDocument = serde_json::from_str(&body)
            .map_err(|e| network_error(format!("invalid registry response: {e}")))?;
        Ok(document.version)
    }
}
