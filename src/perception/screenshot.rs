// Full-screen capture backends.
use std::ffi::OsStr;
use std::path::Path;

use async_trait::async_trait;

use crate::errors::{ScreenCueError, ScreenCueResult};
use crate::perception::external_tool::ExternalTool;
use crate::perception::traits::ScreenCapturer;

/// KDE Spectacle in background mode: `spectacle -b -n -f -o <path>`.
pub struct SpectacleCapturer {
    tool: ExternalTool,
}

impl SpectacleCapturer {
    pub fn new() -> Self {
        Self {
            tool: ExternalTool::spectacle(),
        }
    }

    pub fn with_tool(tool: ExternalTool) -> Self {
        Self { tool }
    }
}

impl Default for SpectacleCapturer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScreenCapturer for SpectacleCapturer {
    fn name(&self) -> &str {
        &self.tool.program
    }

    async fn capture(&self, output: &Path) -> ScreenCueResult<()> {
        let args = [
            OsStr::new("-b"),
            OsStr::new("-n"),
            OsStr::new("-f"),
            OsStr::new("-o"),
            output.as_os_str(),
        ];
        self.tool.run_checked(args).await?;
        // spectacle exits 0 on some compositors without writing anything
        if !output.exists() {
            return Err(ScreenCueError::Capture(format!(
                "{} produced no file at {}",
                self.tool.program,
                output.display()
            )));
        }
        tracing::debug!(path = %output.display(), "full screenshot written");
        Ok(())
    }
}

/// In-process capture of the first monitor through `xcap`.
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapCapturer;

#[async_trait]
impl ScreenCapturer for XcapCapturer {
    fn name(&self) -> &str {
        "xcap"
    }

    async fn capture(&self, output: &Path) -> ScreenCueResult<()> {
        let output = output.to_path_buf();
        tokio::task::spawn_blocking(move || -> ScreenCueResult<()> {
            let monitor = xcap::Monitor::all()
                .map_err(|e| ScreenCueError::Capture(format!("failed to list monitors: {e}")))?
                .into_iter()
                .next()
                .ok_or_else(|| ScreenCueError::Capture("no monitors found".into()))?;
            let image = monitor
                .capture_image()
                .map_err(|e| ScreenCueError::Capture(format!("failed to capture monitor: {e}")))?;
            image
                .save(&output)
                .map_err(|e| ScreenCueError::Capture(format!("failed to write screenshot: {e}")))?;
            tracing::debug!(
                path = %output.display(),
                width = image.width(),
                height = image.height(),
                "full screenshot written"
            );
            Ok(())
        })
        .await
        .map_err(|e| ScreenCueError::Capture(format!("capture worker failed: {e}")))?
    }
}
