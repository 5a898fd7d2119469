//! Running a validated command.
//!
//! A [`PreparedCommand`] can only be built by
//! [`CommandAllowlist::prepare`](super::command::CommandAllowlist::prepare),
//! so every spawn goes through the allowlist first.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::ExecError;

/// Captured result of a finished command. A non-zero exit is reported here,
/// not as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was ended by a signal
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct PreparedCommand {
    pub(crate) program: String,
    pub(crate) args: Vec<String>,
    pub(crate) cwd: PathBuf,
}

impl PreparedCommand {
    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Spawn the command and wait for it, killing the child if `limit` elapses.
    pub async fn run(self, limit: Duration) -> Result<CommandOutput, ExecError> {
        tracing::info!(
            "Running command: {} {} in {}",
            self.program,
            self.args.join(" "),
            self.cwd.display()
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::SpawnFailed {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(ExecError::Io {
                reason: "child output was not captured".to_string(),
            });
        };

        // Drain both pipes concurrently so a full stderr cannot block stdout
        let collect = async {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let (out_res, err_res) = tokio::join!(stdout.read_to_end(&mut out), stderr.read_to_end(&mut err));
            out_res?;
            err_res?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((out, err, status))
        };

        let result = timeout(limit, collect).await;
        match result {
            Ok(Ok((out, err, status))) => {
                let output = CommandOutput {
                    success: status.success(),
                    stdout: String::from_utf8_lossy(&out).into_owned(),
                    stderr: String::from_utf8_lossy(&err).into_owned(),
                    exit_code: status.code(),
                };
                tracing::debug!("Command exited with {:?}", output.exit_code);
                Ok(output)
            }
            Ok(Err(e)) => Err(ExecError::Io { reason: e.to_string() }),
            Err(_) => {
                tracing::error!("Command timed out after {} seconds", limit.as_secs());
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill timed out command: {}", e);
                }
                Err(ExecError::Timeout { limit })
            }
        }
    }
}
