//! Starting the external database utility.
//!
//! A launch is considered failed when the process cannot be spawned, exits
//! with a non-zero status, or writes anything to stderr (even with a zero
//! exit status). Success only means the utility was started; the real
//! outcome arrives later as a reply on the shared listener.
//!
//! The child is reaped by a detached task. An operation may settle on its
//! reply while the utility is still running; dropping the launch future then
//! stops waiting for it but leaves its pipes drained until it exits.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use airdb_core::CommandLine;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::config::LaunchMode;

/// Failure to start the external utility.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("error: failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("error: failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("error: {program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("stderr: {0}")]
    Stderr(String),
}

/// Starts the external utility with a fully built command line.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Launch the utility and wait until the launch itself has finished.
    async fn launch(&self, command: &CommandLine) -> Result<(), LaunchError>;
}

/// Launches the utility as an OS process via `tokio::process`.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    app_path: PathBuf,
    mode: LaunchMode,
}

impl ProcessLauncher {
    #[must_use]
    pub fn new(app_path: impl Into<PathBuf>, mode: LaunchMode) -> Self {
        Self {
            app_path: app_path.into(),
            mode,
        }
    }

    /// Builds the OS command for `command` without running it.
    #[must_use]
    pub fn build(&self, command: &CommandLine) -> Command {
        let mut cmd = match self.mode {
            LaunchMode::Direct => Command::new(&self.app_path),
            LaunchMode::Open => {
                let mut open = Command::new("open");
                open.arg("-a").arg(&self.app_path).arg("--args");
                open
            }
        };
        cmd.args(command.argv())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn program(&self) -> String {
        match self.mode {
            LaunchMode::Direct => self.app_path.display().to_string(),
            LaunchMode::Open => format!("open -a {}", self.app_path.display()),
        }
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, command: &CommandLine) -> Result<(), LaunchError> {
        let program = self.program();
        debug!("EXEC {} {}", program, command.redacted());

        let child = self
            .build(command)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: program.clone(),
                source,
            })?;

        // Dropping the JoinHandle detaches the task; it keeps reading
        // stdout and stderr until the child exits.
        let output = tokio::spawn(child.wait_with_output())
            .await
            .map_err(io::Error::from)
            .and_then(|result| result)
            .map_err(|source| LaunchError::Wait {
                program: program.clone(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(LaunchError::Exit {
                program,
                status: output.status.to_string(),
                stderr,
            });
        }
        if !stderr.is_empty() {
            return Err(LaunchError::Stderr(stderr));
        }

        if !output.stdout.is_empty() {
            debug!(stdout = %String::from_utf8_lossy(&output.stdout), "utility output");
        }
        Ok(())
    }
}
