mod clean;
mod engine;
mod install;
mod migrate;

pub use clean::clean_working_tree;
pub use engine::{RegenerationEngine, RegenerationRequest, FIRST_DEDICATED_CLI_VERSION};
pub use install::{install_package_locally, install_project_dependencies, DEPENDENCY_CACHE_DIR};
pub use migrate::{apply_interim_migrations, LEGACY_RC_FILE};
