use std::time::Duration;

use tokio::time::Instant;

use crate::action_engine::state::RunState;

/// Tracks a bounded or unbounded repetition count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopController {
    /// `0` means unbounded.
    target: u64,
    performed: u64,
}

impl LoopController {
    pub fn new(target: u64) -> Self {
        Self {
            target,
            performed: 0,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.target == 0
    }

    pub fn record(&mut self) -> u64 {
        self.performed += 1;
        self.performed
    }

    pub fn performed(&self) -> u64 {
        self.performed
    }

    pub fn should_stop(&self) -> bool {
        !self.is_unbounded() && self.performed >= self.target
    }
}

/// Sleeps for `total` in slices of at most `slice`, checking the run's cancel
/// flag between slices. Returns `false` if the wait was cut short by cancellation.
/// A `total` too large for the clock waits until cancelled.
pub async fn sleep_unless_cancelled(total: Duration, slice: Duration, run: &RunState) -> bool {
    let slice = slice.max(Duration::from_millis(1));
    let deadline = Instant::now().checked_add(total);
    loop {
        if run.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        let step = match deadline {
            Some(deadline) if now >= deadline => return true,
            Some(deadline) => (deadline - now).min(slice),
            None => slice,
        };
        tokio::time::sleep(step).await;
    }
}
