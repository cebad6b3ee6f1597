use async_trait::async_trait;

use crate::action_engine::state::{RunResult, RunState};
use crate::errors::ScreenCueResult;

/// What a stage asks the engine to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// Stage completed; the text is reported as a progress event.
    Continue(String),
    /// Stop here with this result.
    Finish(RunResult),
    /// Stage completed and was the last one: report the text, then stop with the result.
    /// No cancellation checkpoint sits between the two.
    Last(String, RunResult),
}

/// A staged action sequence driven by the engine.
///
/// The engine calls `advance` repeatedly, checking for cancellation before
/// every call. Each call performs one stage and moves the sequence to its next
/// stage. An `Err` or a panic from `advance` ends the run with an internal failure.
#[async_trait]
pub trait Sequence: Send + 'static {
    fn name(&self) -> &'static str;

    /// Name of the stage the next `advance` call will perform.
    fn stage_name(&self) -> &'static str;

    async fn advance(&mut self, run: &mut RunState) -> ScreenCueResult<StageOutcome>;
}
