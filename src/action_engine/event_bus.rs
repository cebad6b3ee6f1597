use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::action_engine::state::{ErrorKind, RunResult, RunSignals};

/// Events flowing from a run's worker to its initiator, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    Progress { step: u64, text: String },
    /// Always the last event of a run. `artifacts` lists every file the run left on disk.
    Done {
        result: RunResult,
        artifacts: Vec<PathBuf>,
    },
}

/// Worker side of the channel.
pub(crate) struct EventSender {
    tx: mpsc::Sender<EngineEvent>,
    signals: Arc<RunSignals>,
}

impl EventSender {
    pub(crate) fn new(tx: mpsc::Sender<EngineEvent>, signals: Arc<RunSignals>) -> Self {
        Self { tx, signals }
    }

    /// A vanished subscriber can no longer cancel, so losing it cancels the run.
    pub(crate) async fn progress(&self, step: u64, text: String) {
        if self.tx.send(EngineEvent::Progress { step, text }).await.is_err() {
            if !self.signals.is_cancelled() {
                tracing::warn!("run subscriber dropped; cancelling run");
            }
            self.signals.cancel();
        }
    }

    pub(crate) async fn done(self, result: RunResult, artifacts: Vec<PathBuf>) {
        if self
            .tx
            .send(EngineEvent::Done { result, artifacts })
            .await
            .is_err()
        {
            tracing::debug!("run subscriber dropped before the terminal event");
        }
    }
}

/// What a finished run left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub result: RunResult,
    pub artifacts: Vec<PathBuf>,
    /// Progress texts in the order they were emitted.
    pub progress: Vec<String>,
}

/// Initiator side of one run: event subscription plus cancellation.
pub struct RunHandle {
    id: Uuid,
    signals: Arc<RunSignals>,
    events: mpsc::Receiver<EngineEvent>,
    task: JoinHandle<()>,
    finished: bool,
}

impl RunHandle {
    pub(crate) fn new(
        id: Uuid,
        signals: Arc<RunSignals>,
        events: mpsc::Receiver<EngineEvent>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            id,
            signals,
            events,
            task,
            finished: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Requests cooperative cancellation. Takes effect at the next checkpoint.
    pub fn cancel(&self) {
        tracing::info!(run_id = %self.id, "cancellation requested");
        self.signals.cancel();
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.signals.is_cancelled()
    }

    /// Most recent status text reported by the worker.
    pub fn status(&self) -> String {
        self.signals.status()
    }

    /// Next event, or `None` once the terminal event has been delivered.
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        if self.finished {
            return None;
        }
        let event = self.events.recv().await;
        match &event {
            Some(EngineEvent::Done { .. }) | None => self.finished = true,
            Some(EngineEvent::Progress { .. }) => {}
        }
        event
    }

    /// Drains the run to its terminal event.
    pub async fn wait(mut self) -> RunSummary {
        let mut progress = Vec::new();
        while let Some(event) = self.next_event().await {
            match event {
                EngineEvent::Progress { text, .. } => progress.push(text),
                EngineEvent::Done { result, artifacts } => {
                    let _ = (&mut self.task).await;
                    return RunSummary {
                        result,
                        artifacts,
                        progress,
                    };
                }
            }
        }
        // The worker always sends Done; reaching this means its task died.
        let message = match (&mut self.task).await {
            Err(e) => format!("run worker failed: {e}"),
            Ok(()) => "run worker exited without a result".to_string(),
        };
        RunSummary {
            result: RunResult::failure(ErrorKind::Internal, message),
            artifacts: Vec::new(),
            progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::action_engine::engine::Engine;
    use crate::action_engine::sequence::{Sequence, StageOutcome};
    use crate::action_engine::state::RunState;
    use crate::errors::ScreenCueResult;

    struct TwoThenLast {
        stage: u32,
    }

    #[async_trait]
    impl Sequence for TwoThenLast {
        fn name(&self) -> &'static str {
            "two_then_last"
        }

        fn stage_name(&self) -> &'static str {
            "stage"
        }

        async fn advance(&mut self, _run: &mut RunState) -> ScreenCueResult<StageOutcome> {
            self.stage += 1;
            Ok(match self.stage {
                1 | 2 => StageOutcome::Continue(format!("stage {}", self.stage)),
                _ => StageOutcome::Last("last".into(), RunResult::success(None)),
            })
        }
    }

    /// Reads the raw channel until the worker drops its sender, bypassing the
    /// handle's own end-of-run bookkeeping.
    async fn drain_channel(handle: &mut RunHandle) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.events.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn channel_closes_right_after_the_single_done() {
        let mut handle = Engine::new().start(TwoThenLast { stage: 0 }).unwrap();
        let events = drain_channel(&mut handle).await;

        let done_at: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, EngineEvent::Done { .. }))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(done_at, vec![events.len() - 1]);
        assert_eq!(
            events[..events.len() - 1],
            [
                EngineEvent::Progress { step: 1, text: "stage 1".into() },
                EngineEvent::Progress { step: 2, text: "stage 2".into() },
                EngineEvent::Progress { step: 3, text: "last".into() },
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_run_still_ends_with_exactly_one_done() {
        let mut handle = Engine::new().start(TwoThenLast { stage: 0 }).unwrap();
        handle.cancel();
        let events = drain_channel(&mut handle).await;

        let dones = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::Done { .. }))
            .count();
        assert_eq!(dones, 1);
        assert!(matches!(events.last(), Some(EngineEvent::Done { result, .. }) if !result.is_success()));
    }
}
