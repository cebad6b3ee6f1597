use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::action_engine::loop_control::{sleep_unless_cancelled, LoopController};
use crate::action_engine::sequence::{Sequence, StageOutcome};
use crate::action_engine::state::{RunResult, RunState};
use crate::config::{ClickerDefaults, TimingsConfig};
use crate::errors::{ScreenCueError, ScreenCueResult};
use crate::executor::input::{ClickKind, InputInjector, MouseButton};
use crate::perception::types::Point;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickRequest {
    count: u64,
    interval: Duration,
    button: MouseButton,
    kind: ClickKind,
    lock_coordinates: bool,
}

impl ClickRequest {
    /// `count == 0` clicks until cancelled. `interval_secs` must be finite and
    /// non-negative; `0` clicks back to back.
    pub fn new(
        count: u64,
        interval_secs: f64,
        button: MouseButton,
        kind: ClickKind,
        lock_coordinates: bool,
    ) -> ScreenCueResult<Self> {
        if !interval_secs.is_finite() || interval_secs < 0.0 {
            return Err(ScreenCueError::InvalidRequest(format!(
                "click interval must be a finite, non-negative number of seconds, got {interval_secs}"
            )));
        }
        let interval = Duration::try_from_secs_f64(interval_secs).map_err(|e| {
            ScreenCueError::InvalidRequest(format!("click interval {interval_secs}s: {e}"))
        })?;
        Ok(Self {
            count,
            interval,
            button,
            kind,
            lock_coordinates,
        })
    }

    pub fn from_defaults(defaults: &ClickerDefaults) -> ScreenCueResult<Self> {
        Self::new(
            defaults.count,
            defaults.interval_secs,
            defaults.button,
            defaults.kind,
            defaults.lock_coordinates,
        )
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn button(&self) -> MouseButton {
        self.button
    }

    pub fn kind(&self) -> ClickKind {
        self.kind
    }

    pub fn lock_coordinates(&self) -> bool {
        self.lock_coordinates
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Countdown(u32),
    SamplePosition,
    Clicking,
}

/// Countdown, optional pointer lock, then clicks until the target count or cancellation.
pub struct RepeatingClickSequence {
    request: ClickRequest,
    injector: Arc<dyn InputInjector>,
    timings: TimingsConfig,
    phase: Phase,
    /// The countdown tick announced by the previous stage, still to be waited out.
    tick_owed: bool,
    locked_at: Option<Point>,
    clicks: LoopController,
}

impl RepeatingClickSequence {
    pub fn new(request: ClickRequest, injector: Arc<dyn InputInjector>, timings: TimingsConfig) -> Self {
        let mut sequence = Self {
            request,
            injector,
            timings,
            phase: Phase::Clicking,
            tick_owed: false,
            locked_at: None,
            clicks: LoopController::new(request.count),
        };
        sequence.phase = if sequence.timings.countdown_ticks > 0 {
            Phase::Countdown(sequence.timings.countdown_ticks)
        } else {
            sequence.after_countdown()
        };
        sequence
    }

    fn after_countdown(&self) -> Phase {
        if self.request.lock_coordinates {
            Phase::SamplePosition
        } else {
            Phase::Clicking
        }
    }
}

#[async_trait]
impl Sequence for RepeatingClickSequence {
    fn name(&self) -> &'static str {
        "repeating_click"
    }

    fn stage_name(&self) -> &'static str {
        match self.phase {
            Phase::Countdown(_) => "countdown",
            Phase::SamplePosition => "sample_position",
            Phase::Clicking => "click",
        }
    }

    async fn advance(&mut self, run: &mut RunState) -> ScreenCueResult<StageOutcome> {
        // Each countdown event leads its tick, so the wait happens at the start of the next stage.
        if std::mem::take(&mut self.tick_owed)
            && !sleep_unless_cancelled(self.timings.countdown_tick(), self.timings.poll_slice(), run)
                .await
        {
            return Ok(StageOutcome::Finish(RunResult::cancelled()));
        }

        match self.phase {
            Phase::Countdown(remaining) => {
                self.tick_owed = true;
                self.phase = if remaining > 1 {
                    Phase::Countdown(remaining - 1)
                } else {
                    self.after_countdown()
                };
                Ok(StageOutcome::Continue(format!(
                    "Starting in {remaining}... (Keep mouse still!)"
                )))
            }
            Phase::SamplePosition => {
                let point = self.injector.pointer_position().await?;
                tracing::info!(%point, "pointer position locked");
                self.locked_at = Some(point);
                self.phase = Phase::Clicking;
                Ok(StageOutcome::Continue(format!("Locked to {point}")))
            }
            Phase::Clicking => {
                // Every click after the first waits out the interval first.
                if self.clicks.performed() > 0
                    && !sleep_unless_cancelled(self.request.interval, self.timings.poll_slice(), run)
                        .await
                {
                    return Ok(StageOutcome::Finish(RunResult::cancelled()));
                }
                self.injector
                    .click(self.locked_at, self.request.button, self.request.kind)
                    .await?;
                let performed = self.clicks.record();
                tracing::debug!(performed, "click performed");
                let status = format!("Clicks performed: {performed}");
                if self.clicks.should_stop() {
                    tracing::info!(performed, "click target reached");
                    return Ok(StageOutcome::Last(status, RunResult::success(None)));
                }
                Ok(StageOutcome::Continue(status))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_must_be_finite_and_non_negative() {
        let ok = |secs| ClickRequest::new(1, secs, MouseButton::Primary, ClickKind::Single, false);
        assert!(ok(0.0).is_ok());
        assert_eq!(ok(0.25).unwrap().interval(), Duration::from_millis(250));
        assert!(ok(-1.0).is_err());
        assert!(ok(f64::NAN).is_err());
        assert!(ok(f64::INFINITY).is_err());
        assert_eq!(ok(1e19).unwrap().interval(), Duration::from_secs(10_000_000_000_000_000_000));
    }

    #[test]
    fn defaults_build_an_unbounded_ten_second_clicker() {
        let req = ClickRequest::from_defaults(&ClickerDefaults::default()).unwrap();
        assert_eq!(req.count(), 0);
        assert_eq!(req.interval(), Duration::from_secs(10));
        assert!(!req.lock_coordinates());
    }
}
