use thiserror::Error;

/// Fatal failure categories for an upgrade run. Merge conflicts are not
/// represented here: they are an expected outcome, reported as data by the
/// merge-back step.
#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("environment error: {0}")]
    Environment(String),

    #[error("local changes found, please commit or stash them before upgrading:\n{0}")]
    DirtyWorkingTree(String),

    #[error("failed looking up latest version of '{package}': {message}")]
    Network { package: String, message: String },

    #[error("failed looking up latest versions for {} plugin(s): {}",
        .0.len(),
        .0.iter()
            .map(|(name, message)| format!("{name} ({message})"))
            .collect::<Vec<_>>()
            .join(", "))]
    PluginLookupsFailed(Vec<(String, String)>),

    #[error("no update available: project was already generated with the latest version")]
    NoUpdateAvailable,

    #[error("command '{command}' failed with exit code {exit_code}:\n{stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("regeneration process failed with exit code {exit_code}")]
    RegenerationFailed { exit_code: i32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
