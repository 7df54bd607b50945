use std::path::{Path, PathBuf};

use reforge_core::UpgradeError;
use reforge_exec::{CommandOutput, CommandRunner, RunOptions};
use semver::Version;

use crate::Vcs;

/// Git implementation of [`Vcs`], shelling through the [`CommandRunner`]
/// seam so every invocation is traced and failures carry the command line.
pub struct GitCli<R: CommandRunner> {
    runner: R,
    root: PathBuf,
}

impl<R: CommandRunner> GitCli<R> {
    pub fn new(runner: R, root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn git(&self, args: &[&str]) -> Result<CommandOutput, UpgradeError> {
        self.runner
            .run("git", &with_base_config(args), &RunOptions::in_dir(&self.root))
    }

    fn git_checked(&self, args: &[&str]) -> Result<CommandOutput, UpgradeError> {
        self.runner.run_checked(
            "git",
            &with_base_config(args),
            &RunOptions::in_dir(&self.root),
        )
    }
}

// Line-ending normalization is forced off so regenerating the same tree
// twice never manufactures whitespace-only diffs.
fn with_base_config<'a>(args: &[&'a str]) -> Vec<&'a str> {
    let mut full = vec!["-c", "core.autocrlf=false", "-c", "core.eol=lf"];
    full.extend_from_slice(args);
    full
}

impl<R: CommandRunner> Vcs for GitCli<R> {
    fn tool_version(&self) -> Result<Version, UpgradeError> {
        let output = self.git_checked(&["--version"])?;
        parse_tool_version(&output.stdout).ok_or_else(|| {
            UpgradeError::Environment(format!(
                "could not parse git version from '{}'",
                output.stdout.trim()
            ))
        })
    }

    fn is_inside_work_tree(&self) -> Result<bool, UpgradeError> {
        let output = self.git(&["rev-parse", "-q", "--is-inside-work-tree"])?;
        Ok(output.success() && output.stdout.trim() == "true")
    }

    fn init(&self) -> Result<(), UpgradeError> {
        self.git_checked(&["init"])?;
        Ok(())
    }

    fn current_branch(&self) -> Result<String, UpgradeError> {
        let output = self.git_checked(&["rev-parse", "-q", "--abbrev-ref", "HEAD"])?;
        Ok(output.stdout.trim().to_string())
    }

    fn branch_exists(&self, branch: &str) -> Result<bool, UpgradeError> {
        // A revision lookup, not a cached flag: the branch itself is the
        // durable signal that the baseline was already captured.
        let output = self.git(&["rev-parse", "-q", "--verify", branch])?;
        Ok(output.success())
    }

    fn checkout(&self, branch: &str, force: bool) -> Result<(), UpgradeError> {
        let mut args = vec!["checkout", "-q", branch];
        if force {
            args.push("-f");
        }
        self.git_checked(&args)?;
        Ok(())
    }

    fn checkout_orphan(&self, branch: &str) -> Result<(), UpgradeError> {
        self.git_checked(&["checkout", "--orphan", branch])?;
        Ok(())
    }

    fn commit_all(&self, message: &str) -> Result<(), UpgradeError> {
        self.git_checked(&["add", "-A"])?;
        self.git_checked(&[
            "commit",
            "-q",
            "-m",
            message,
            "-a",
            "--allow-empty",
            "--no-verify",
        ])?;
        Ok(())
    }

    fn merge_ours(&self, branch: &str, allow_unrelated: bool) -> Result<(), UpgradeError> {
        let mut args = vec!["merge", "--strategy=ours", "-q", "--no-edit"];
        if allow_unrelated {
            args.push("--allow-unrelated-histories");
        }
        args.push(branch);
        self.git_checked(&args)?;
        Ok(())
    }

    fn merge(&self, branch: &str) -> Result<CommandOutput, UpgradeError> {
        self.git(&["merge", "-q", branch])
    }

    fn conflicted_files(&self, pathspec: Option<&str>) -> Result<Vec<String>, UpgradeError> {
        let mut args = vec!["diff", "--name-only", "--diff-filter=U"];
        if let Some(pathspec) = pathspec {
            args.push("--");
            args.push(pathspec);
        }
        let output = self.git_checked(&args)?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn status_porcelain(&self) -> Result<String, UpgradeError> {
        let output = self.git_checked(&["status", "--porcelain"])?;
        Ok(output.stdout)
    }
}

/// Extracts `major.minor.patch` from `git --version` output, tolerating
/// platform suffixes like `2.39.2.windows.1`.
fn parse_tool_version(stdout: &str) -> Option<Version> {
    for token in stdout.split_whitespace() {
        let numeric: Vec<&str> = token
            .split('.')
            .take_while(|part| part.chars().all(|ch| ch.is_ascii_digit()) && !part.is_empty())
            .take(3)
            .collect();
        if numeric.len() == 3 {
            return Version::parse(&numeric.join(".")).ok();
        }
    }
    None
}
