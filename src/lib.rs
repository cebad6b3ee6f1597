pub mod action_engine;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;

use std::sync::Arc;

use crate::action_engine::capture_sequence::Collaborators;
use crate::config::{AppConfig, CaptureBackend, CropBackend};
use crate::errors::ScreenCueResult;
use crate::executor::input::EnigoInjector;
use crate::llm::registry::client_from_config;
use crate::perception::crop::{GmCropper, ImageCropper};
use crate::perception::screenshot::{SpectacleCapturer, XcapCapturer};
use crate::perception::traits::{Cropper, ScreenCapturer};

pub use crate::action_engine::engine::Engine;
pub use crate::action_engine::event_bus::{EngineEvent, RunHandle, RunSummary};
pub use crate::action_engine::state::{ErrorKind, RunResult};
pub use crate::errors::ScreenCueError;

/// Installs the global `tracing` subscriber. `RUST_LOG` wins; otherwise `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Production collaborators selected by `[tools]` and `[inference]`.
pub fn collaborators_from_config(config: &AppConfig) -> ScreenCueResult<Collaborators> {
    let capturer: Arc<dyn ScreenCapturer> = match config.tools.capture {
        CaptureBackend::Spectacle => Arc::new(SpectacleCapturer::new()),
        CaptureBackend::Xcap => Arc::new(XcapCapturer),
    };
    let cropper: Arc<dyn Cropper> = match config.tools.crop {
        CropBackend::Gm => Arc::new(GmCropper::new()),
        CropBackend::Image => Arc::new(ImageCropper),
    };
    tracing::debug!(
        capturer = capturer.name(),
        cropper = cropper.name(),
        "collaborators selected"
    );
    Ok(Collaborators {
        injector: Arc::new(EnigoInjector::new()),
        capturer,
        cropper,
        inference: client_from_config(&config.inference)?,
    })
}
