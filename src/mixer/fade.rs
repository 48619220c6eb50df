//! Linear fade-out schedule

/// Fade tick interval
pub const FADE_TICK_MS: u64 = 100;

/// How a `fade_out` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeOutcome {
    /// Ran to the last step and paused every channel
    Completed,
    /// Cancelled by a newer fade, a reset, or teardown
    Superseded,
}

/// Step counter for a fade of a given duration.
///
/// The duration is split into `floor(duration / 100 ms)` steps; at step `k`
/// the multiplier is `max(0, 1 - k * (1 / steps))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadePlan {
    steps: u64,
    step: u64,
    decrement: f32,
}

impl FadePlan {
    pub fn new(duration_ms: u64) -> Self {
        let steps = duration_ms / FADE_TICK_MS;
        let decrement = if steps == 0 { 1.0 } else { 1.0 / steps as f32 };
        Self {
            steps,
            step: 0,
            decrement,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Shorter than one tick: nothing to step through
    pub fn is_degenerate(&self) -> bool {
        self.steps == 0
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.steps
    }

    pub fn multiplier_at(&self, step: u64) -> f32 {
        (1.0 - step as f32 * self.decrement).max(0.0)
    }

    /// Multiplier for the current step (1.0 before the first tick)
    pub fn multiplier(&self) -> f32 {
        self.multiplier_at(self.step)
    }

    /// Move to the next step and return its multiplier
    pub fn advance(&mut self) -> f32 {
        self.step = (self.step + 1).min(self.steps);
        self.multiplier()
    }
}
