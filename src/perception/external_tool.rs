//! Runner for the command-line utilities the perception collaborators shell out to
//! (`spectacle`, `gm`, `slurp`). A missing executable is reported as
//! [`ScreenCueError::ToolNotFound`] naming the tool, never as a generic IO error.
use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

use crate::errors::{ScreenCueError, ScreenCueResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    pub program: String,
    pub install_hint: String,
}

#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ExternalTool {
    pub fn new(program: impl Into<String>, install_hint: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            install_hint: install_hint.into(),
        }
    }

    pub fn spectacle() -> Self {
        Self::new("spectacle", "Install it for KDE screenshot functionality.")
    }

    pub fn graphicsmagick() -> Self {
        Self::new("gm", "Install GraphicsMagick.")
    }

    pub fn slurp() -> Self {
        Self::new("slurp", "Install it for region selection: sudo apt install slurp")
    }

    /// Runs the tool to completion and returns its output whatever the exit status.
    pub async fn run<I, S>(&self, args: I) -> ScreenCueResult<ToolOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ScreenCueError::ToolNotFound {
                        tool: self.program.clone(),
                        hint: self.install_hint.clone(),
                    }
                } else {
                    ScreenCueError::Io(e)
                }
            })?;

        let out = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(tool = %self.program, status = ?out.status.code(), "external tool finished");
        Ok(out)
    }

    /// Like [`run`](Self::run), but a non-zero exit becomes [`ScreenCueError::ToolFailed`].
    pub async fn run_checked<I, S>(&self, args: I) -> ScreenCueResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let out = self.run(args).await?;
        if out.status.success() {
            return Ok(out.stdout);
        }
        let stderr = out.stderr.trim();
        let message = if stderr.is_empty() {
            format!("exited with {}", out.status)
        } else {
            stderr.to_string()
        };
        Err(ScreenCueError::ToolFailed {
            tool: self.program.clone(),
            message,
        })
    }
}
