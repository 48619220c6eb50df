//! Cancellable repeating tick tasks
//!
//! Both the fade engine and the countdown timer run on a fixed-interval tick.
//! Each sequence is a tokio task owned through a [`TickHandle`]; dropping the
//! handle aborts the task. Owners additionally tag every sequence
//! with a generation number checked under their own lock, so a tick that is
//! already executing when its sequence is cancelled cannot touch state.

use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Handle to a running tick sequence. Dropping it aborts the task; no
/// further tick starts after the drop returns.
#[derive(Debug)]
pub struct TickHandle {
    task: JoinHandle<()>,
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a repeating tick on the current tokio runtime.
///
/// The first tick fires one `period` after the call, then every `period`.
/// The closure returns `ControlFlow::Break(())` to end the sequence.
pub fn spawn_repeating<F>(period: Duration, mut tick: F) -> TickHandle
where
    F: FnMut() -> ControlFlow<()> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if tick().is_break() {
                break;
            }
        }
    });
    TickHandle { task }
}

/// Monotonic counter used to invalidate superseded tick sequences
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

impl Generation {
    /// Move to a fresh generation, returning it
    pub fn advance(&mut self) -> Generation {
        self.0 = self.0.wrapping_add(1);
        *self
    }
}
