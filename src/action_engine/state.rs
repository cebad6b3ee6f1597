use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message carried by every cancellation failure.
pub const CANCELLED_MESSAGE: &str = "stopped by user";

/// Why a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Cancelled,
    CaptureUnavailable,
    CropFailed,
    InferenceFailed,
    Internal,
}

/// Terminal outcome of one run. Produced exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunResult {
    /// `artifact` is the file the caller should consume and then delete, if any.
    Success { artifact: Option<PathBuf> },
    Failure { kind: ErrorKind, message: String },
}

impl RunResult {
    pub fn success(artifact: Option<PathBuf>) -> Self {
        Self::Success { artifact }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::failure(ErrorKind::Cancelled, CANCELLED_MESSAGE)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        match self {
            Self::Success { artifact: Some(path) } => format!("Completed ({})", path.display()),
            Self::Success { artifact: None } => "Completed".to_string(),
            Self::Failure { kind, message } => format!("Failed [{kind:?}]: {message}"),
        }
    }
}

/// The only state touched by both the initiating side and the worker:
/// the initiator writes the cancel flag and reads the status; the worker does the reverse.
#[derive(Debug, Default)]
pub struct RunSignals {
    cancelled: AtomicBool,
    status: Mutex<String>,
}

impl RunSignals {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> String {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_status(&self, status: &str) {
        let mut guard = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        guard.clear();
        guard.push_str(status);
    }
}

/// Per-run state owned by the engine worker and lent to each stage.
#[derive(Debug)]
pub struct RunState {
    id: Uuid,
    step: u64,
    signals: Arc<RunSignals>,
    artifacts: Vec<PathBuf>,
}

impl RunState {
    pub(crate) fn new(id: Uuid, signals: Arc<RunSignals>) -> Self {
        Self {
            id,
            step: 0,
            signals,
            artifacts: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of stages completed so far.
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn is_cancelled(&self) -> bool {
        self.signals.is_cancelled()
    }

    pub fn status(&self) -> String {
        self.signals.status()
    }

    /// Registers a file this run owns. Register before the file is written so
    /// partial output is still reported to the caller.
    pub fn record_artifact(&mut self, path: &Path) {
        if !self.artifacts.iter().any(|p| p == path) {
            self.artifacts.push(path.to_path_buf());
        }
    }

    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    pub(crate) fn complete_stage(&mut self, status: &str) -> u64 {
        self.step += 1;
        self.signals.set_status(status);
        self.step
    }

    /// Artifacts that actually exist on disk.
    pub(crate) fn take_artifacts(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.artifacts)
            .into_iter()
            .filter(|p| p.exists())
            .collect()
    }
}
