use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use crate::action_engine::event_bus::{EventSender, RunHandle};
use crate::action_engine::sequence::{Sequence, StageOutcome};
use crate::action_engine::state::{ErrorKind, RunResult, RunSignals, RunState};
use crate::errors::{ScreenCueError, ScreenCueResult};

const EVENT_BUFFER: usize = 64;

#[derive(Debug)]
struct ActiveRun {
    id: Uuid,
    signals: Arc<RunSignals>,
}

type ActiveSlot = Arc<Mutex<Option<ActiveRun>>>;

/// Frees the engine's single run slot when the worker finishes, even by unwinding.
struct SlotGuard {
    slot: ActiveSlot,
    id: Uuid,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut active = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|run| run.id == self.id) {
            *active = None;
        }
    }
}

/// Runs one staged sequence at a time on a background tokio task.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    active: ActiveSlot,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a worker for `sequence`. Must be called from within a tokio runtime.
    ///
    /// Fails with [`ScreenCueError::EngineBusy`] while another run is active.
    pub fn start<S: Sequence>(&self, sequence: S) -> ScreenCueResult<RunHandle> {
        let id = Uuid::new_v4();
        let signals = Arc::new(RunSignals::default());
        {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(current) = active.as_ref() {
                tracing::warn!(active_run = %current.id, "rejecting run: engine busy");
                return Err(ScreenCueError::EngineBusy);
            }
            *active = Some(ActiveRun {
                id,
                signals: signals.clone(),
            });
        }

        let guard = SlotGuard {
            slot: self.active.clone(),
            id,
        };
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let events = EventSender::new(tx, signals.clone());
        let run = RunState::new(id, signals.clone());
        let span = tracing::info_span!("run", run_id = %id, sequence = sequence.name());

        tracing::info!(run_id = %id, sequence = sequence.name(), "starting run");
        let task = tokio::spawn(drive(sequence, run, events, guard).instrument(span));
        Ok(RunHandle::new(id, signals, rx, task))
    }

    pub fn cancel(&self, handle: &RunHandle) {
        handle.cancel();
    }

    /// Cancels whatever run is active. Returns its id, if there was one.
    pub fn cancel_active(&self) -> Option<Uuid> {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.as_ref().map(|run| {
            tracing::info!(run_id = %run.id, "cancelling active run");
            run.signals.cancel();
            run.id
        })
    }

    pub fn is_busy(&self) -> bool {
        self.active_run().is_some()
    }

    pub fn active_run(&self) -> Option<Uuid> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|run| run.id)
    }
}

async fn drive<S: Sequence>(mut sequence: S, mut run: RunState, events: EventSender, guard: SlotGuard) {
    let result = loop {
        if run.is_cancelled() {
            tracing::info!(step = run.step(), stage = sequence.stage_name(), "run cancelled at checkpoint");
            break RunResult::cancelled();
        }

        let stage = sequence.stage_name();
        tracing::debug!(step = run.step(), stage, "entering stage");
        let outcome = AssertUnwindSafe(sequence.advance(&mut run))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(StageOutcome::Continue(text))) => {
                let step = run.complete_stage(&text);
                tracing::info!(step, stage, status = %text, "stage complete");
                events.progress(step, text).await;
            }
            Ok(Ok(StageOutcome::Finish(result))) => {
                tracing::debug!(stage, "sequence finished");
                break result;
            }
            Ok(Ok(StageOutcome::Last(text, result))) => {
                let step = run.complete_stage(&text);
                tracing::info!(step, stage, status = %text, "final stage complete");
                events.progress(step, text).await;
                break result;
            }
            Ok(Err(e)) => {
                tracing::error!(stage, error = %e, "stage failed");
                break RunResult::failure(ErrorKind::Internal, e.to_string());
            }
            Err(payload) => {
                let message = format!("stage '{stage}' panicked: {}", panic_message(payload.as_ref()));
                tracing::error!(stage, "{message}");
                break RunResult::failure(ErrorKind::Internal, message);
            }
        }
    };

    let artifacts = run.take_artifacts();
    match &result {
        RunResult::Success { .. } => tracing::info!(steps = run.step(), "run succeeded"),
        RunResult::Failure { kind, message } => {
            tracing::warn!(steps = run.step(), ?kind, %message, "run failed")
        }
    }

    // Free the slot first so a caller reacting to Done can start the next run.
    drop(guard);
    events.done(result, artifacts).await;
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
