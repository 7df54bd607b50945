mod config;
mod error;
mod session;
mod version;

pub use config::{BlueprintDecl, ProjectConfig, CONFIG_FILE, MANIFEST_FILE, STATE_DIR};
pub use error::UpgradeError;
pub use session::UpgradeSession;
pub use version::{parse_blueprint_specs, Plugin, TargetSpec, GENERATOR_PACKAGE};
