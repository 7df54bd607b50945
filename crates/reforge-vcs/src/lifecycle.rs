use reforge_core::UpgradeError;
use semver::Version;

use crate::Vcs;

/// Dedicated history line recording clean generated output at the old and
/// new generator versions. Its existence is the durable resume signal for
/// an interrupted upgrade.
pub const UPGRADE_BRANCH: &str = "reforge_upgrade";

/// From this git version on, merging histories with no common ancestor must
/// be requested explicitly; older versions allow it implicitly.
const GIT_UNRELATED_HISTORIES_MIN: (u64, u64, u64) = (2, 9, 0);

/// Outcome of merging the isolation branch back into the source branch.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub conflicts: Vec<String>,
}

impl MergeReport {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Owns every version-control state transition of an upgrade session:
/// `NO_REPO -> REPO_CLEAN -> ISOLATION_ESTABLISHED -> ... -> MERGED`.
pub struct BranchLifecycle<'a, V: Vcs> {
    vcs: &'a V,
}

impl<'a, V: Vcs> BranchLifecycle<'a, V> {
    pub fn new(vcs: &'a V) -> Self {
        Self { vcs }
    }

    /// Detects a repository, initializing one with an initial commit when
    /// absent so the tool works on freshly unpacked projects. Returns
    /// whether a repository was created.
    pub fn ensure_repository(&self) -> Result<bool, UpgradeError> {
        if self.vcs.is_inside_work_tree()? {
            return Ok(false);
        }
        self.vcs.init()?;
        self.vcs.commit_all("Initial")?;
        Ok(true)
    }

    /// The merge-back strategy assumes the pre-upgrade state is fully
    /// captured in history, so uncommitted work is refused outright.
    pub fn assert_clean_tree(&self) -> Result<(), UpgradeError> {
        let status = self.vcs.status_porcelain()?;
        if !status.trim().is_empty() {
            return Err(UpgradeError::DirtyWorkingTree(status));
        }
        Ok(())
    }

    pub fn source_branch(&self) -> Result<String, UpgradeError> {
        self.vcs.current_branch()
    }

    /// Establishes the isolation branch baseline. When the branch already
    /// exists this is a no-op and an interrupted prior run resumes without
    /// re-doing baseline work. Otherwise: orphan-checkout, run
    /// `baseline_fn` (clean + regenerate-at-current + commit), return to
    /// the source branch and record the generated tree as a common
    /// ancestor via an ours-merge. Returns whether the baseline ran.
    pub fn ensure_baseline(
        &self,
        source_branch: &str,
        current_version: &Version,
        baseline_fn: impl FnOnce() -> Result<(), UpgradeError>,
    ) -> Result<bool, UpgradeError> {
        if self.vcs.branch_exists(UPGRADE_BRANCH)? {
            return Ok(false);
        }

        self.vcs.checkout_orphan(UPGRADE_BRANCH)?;
        baseline_fn()?;
        self.vcs.checkout(source_branch, false)?;
        self.record_generated_ancestor(current_version)?;
        Ok(true)
    }

    fn record_generated_ancestor(&self, current_version: &Version) -> Result<(), UpgradeError> {
        let tool_version = self.vcs.tool_version()?;
        let (major, minor, patch) = GIT_UNRELATED_HISTORIES_MIN;
        let allow_unrelated = tool_version >= Version::new(major, minor, patch);
        self.vcs
            .merge_ours(UPGRADE_BRANCH, allow_unrelated)
            .map_err(|e| match e {
                UpgradeError::CommandFailed {
                    command,
                    exit_code,
                    stderr,
                } => UpgradeError::CommandFailed {
                    command,
                    exit_code,
                    stderr: format!(
                        "unable to record that current code was generated with version \
                         {current_version}:\n{stderr}"
                    ),
                },
                other => other,
            })
    }

    /// Merges the isolation branch into the source branch. Conflicts are an
    /// expected, user-facing outcome and are returned as data. A merge that
    /// fails without leaving any conflicted file behind merged nothing at
    /// all (for example git refusing unrelated histories) and is fatal.
    pub fn merge_isolation_into_source(&self) -> Result<MergeReport, UpgradeError> {
        let output = self.vcs.merge(UPGRADE_BRANCH)?;
        if output.success() {
            return Ok(MergeReport::default());
        }
        let conflicts = self.vcs.conflicted_files(None)?;
        if conflicts.is_empty() {
            return Err(UpgradeError::CommandFailed {
                command: format!("git merge {UPGRADE_BRANCH}"),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(MergeReport { conflicts })
    }
}
