mod git;
mod lifecycle;

use reforge_core::UpgradeError;
use reforge_exec::CommandOutput;
use semver::Version;

pub use git::GitCli;
pub use lifecycle::{BranchLifecycle, MergeReport, UPGRADE_BRANCH};

/// Version-control primitives the upgrade workflow needs. The production
/// implementation shells to git; tests drive the branch state machine
/// through a fake, so the resume-after-crash behavior is checkable without
/// a real repository.
pub trait Vcs {
    fn tool_version(&self) -> Result<Version, UpgradeError>;
    fn is_inside_work_tree(&self) -> Result<bool, UpgradeError>;
    fn init(&self) -> Result<(), UpgradeError>;
    fn current_branch(&self) -> Result<String, UpgradeError>;
    fn branch_exists(&self, branch: &str) -> Result<bool, UpgradeError>;
    fn checkout(&self, branch: &str, force: bool) -> Result<(), UpgradeError>;
    /// Creates a branch with no shared ancestry and checks it out.
    fn checkout_orphan(&self, branch: &str) -> Result<(), UpgradeError>;
    /// Stages everything and commits, allowing an empty commit.
    fn commit_all(&self, message: &str) -> Result<(), UpgradeError>;
    /// Merge that discards the other branch's content but records it as a
    /// common ancestor for future merges.
    fn merge_ours(&self, branch: &str, allow_unrelated: bool) -> Result<(), UpgradeError>;
    /// Plain merge; the raw output is returned so the caller can tell a
    /// conflicted merge (expected, surfaced as data) apart from a merge
    /// git refused outright (fatal, stderr preserved).
    fn merge(&self, branch: &str) -> Result<CommandOutput, UpgradeError>;
    /// Paths still in conflicted state, optionally restricted to one path.
    fn conflicted_files(&self, pathspec: Option<&str>) -> Result<Vec<String>, UpgradeError>;
    fn status_porcelain(&self) -> Result<String, UpgradeError>;
}
