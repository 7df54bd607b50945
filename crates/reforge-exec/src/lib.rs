use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use reforge_core::UpgradeError;

/// Normalized result of one external process invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub current_dir: Option<PathBuf>,
    /// No timeout unless explicitly configured: a hung external process
    /// hangs the orchestrator.
    pub timeout: Option<Duration>,
}

impl RunOptions {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            current_dir: Some(dir.into()),
            timeout: None,
        }
    }
}

/// Single seam through which every external command (version control,
/// package installer, regeneration executable) is invoked, so failures are
/// surfaced uniformly and each invocation can be traced before it runs.
pub trait CommandRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        options: &RunOptions,
    ) -> Result<CommandOutput, UpgradeError>;

    /// Like [`run`](Self::run) but treats any non-zero exit as fatal.
    fn run_checked(
        &self,
        program: &str,
        args: &[&str],
        options: &RunOptions,
    ) -> Result<CommandOutput, UpgradeError> {
        let output = self.run(program, args, options)?;
        if !output.success() {
            return Err(UpgradeError::CommandFailed {
                command: render_command(program, args),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}

/// Runs commands through `std::process`. When `trace` is set, every command
/// line is echoed to stderr before execution, so a stalled upgrade can be
/// diagnosed without re-running.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    trace: bool,
}

impl SystemRunner {
    pub fn new(trace: bool) -> Self {
        Self { trace }
    }
}

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        options: &RunOptions,
    ) -> Result<CommandOutput, UpgradeError> {
        if self.trace {
            eprintln!("$ {}", render_command(program, args));
        }

        let mut command = Command::new(program);
        command.args(args);
        if let Some(dir) = &options.current_dir {
            command.current_dir(dir);
        }

        let output = match options.timeout {
            None => command.output().map_err(|e| spawn_error(program, args, e))?,
            Some(timeout) => {
                command.stdout(Stdio::piped()).stderr(Stdio::piped());
                let mut child = command
                    .spawn()
                    .map_err(|e| spawn_error(program, args, e))?;
                let deadline = Instant::now() + timeout;
                loop {
                    match child.try_wait() {
                        Ok(Some(_)) => break,
                        Ok(None) if Instant::now() >= deadline => {
                            let _ = child.kill();
                            let output = child.wait_with_output()?;
                            return Err(UpgradeError::CommandFailed {
                                command: render_command(program, args),
                                exit_code: -1,
                                stderr: format!(
                                    "timed out after {}s\n{}",
                                    timeout.as_secs(),
                                    String::from_utf8_lossy(&output.stderr).trim()
                                ),
                            });
                        }
                        Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                        Err(e) => return Err(UpgradeError::Io(e)),
                    }
                }
                child.wait_with_output()?
            }
        };

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

fn spawn_error(program: &str, args: &[&str], error: std::io::Error) -> UpgradeError {
    UpgradeError::Environment(format!(
        "failed launching '{}': {error}",
        render_command(program, args)
    ))
}

fn render_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}
