//! Countdown timer driving the sleep timer
//!
//! Counts down in whole 1000 ms ticks. The state machine ([`TimerState`]) is
//! plain data; [`CountdownTimer`] runs it on a repeating tick and fires the
//! optional per-tick and completion callbacks.

use parking_lot::Mutex;
use serde::Serialize;
use std::ops::ControlFlow;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::scheduler::{spawn_repeating, Generation, TickHandle};

/// Countdown tick interval
pub const TIMER_TICK_MS: u64 = 1000;

/// Snapshot of the countdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimerState {
    pub is_running: bool,
    pub remaining_ms: u64,
    /// Duration passed to the last `start`, kept after completion
    pub duration_ms: Option<u64>,
}

/// Result of applying one tick to a [`TimerState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Not running, nothing changed
    Idle,
    /// Still counting, with the new remaining time
    Remaining(u64),
    /// Reached zero on this tick
    Completed,
}

impl TimerState {
    fn begin(&mut self, duration_ms: u64) {
        *self = Self {
            is_running: duration_ms > 0,
            remaining_ms: duration_ms,
            duration_ms: Some(duration_ms),
        };
    }

    /// Apply one tick: decrement by [`TIMER_TICK_MS`], floored at zero
    pub fn tick(&mut self) -> Tick {
        if !self.is_running {
            return Tick::Idle;
        }
        self.remaining_ms = self.remaining_ms.saturating_sub(TIMER_TICK_MS);
        if self.remaining_ms == 0 {
            self.is_running = false;
            Tick::Completed
        } else {
            Tick::Remaining(self.remaining_ms)
        }
    }

    fn halt(&mut self) {
        self.is_running = false;
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

pub type TickCallback = Arc<dyn Fn(u64) + Send + Sync>;
pub type CompleteCallback = Arc<dyn Fn() + Send + Sync>;

/// Optional hooks invoked by the running countdown
#[derive(Default, Clone)]
pub struct TimerCallbacks {
    on_tick: Option<TickCallback>,
    on_complete: Option<CompleteCallback>,
}

impl TimerCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after every tick with the new remaining time
    pub fn on_tick(mut self, f: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.on_tick = Some(Arc::new(f));
        self
    }

    /// Called once when a started countdown reaches zero
    pub fn on_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(f));
        self
    }

    fn fire(&self, tick: Tick) {
        match tick {
            Tick::Idle => {}
            Tick::Remaining(remaining) => {
                if let Some(on_tick) = &self.on_tick {
                    on_tick(remaining);
                }
            }
            Tick::Completed => {
                if let Some(on_tick) = &self.on_tick {
                    on_tick(0);
                }
                if let Some(on_complete) = &self.on_complete {
                    on_complete();
                }
            }
        }
    }
}

struct Inner {
    state: TimerState,
    generation: Generation,
    task: Option<TickHandle>,
}

struct Shared {
    inner: Mutex<Inner>,
    // Never locked: callbacks may call back into the timer
    callbacks: TimerCallbacks,
}

/// Cancellable countdown. Cloning yields another handle to the same timer.
#[derive(Clone)]
pub struct CountdownTimer {
    shared: Arc<Shared>,
}

impl CountdownTimer {
    pub fn new(callbacks: TimerCallbacks) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: TimerState::default(),
                    generation: Generation::default(),
                    task: None,
                }),
                callbacks,
            }),
        }
    }

    /// Start counting down from `duration_ms`, replacing any running countdown.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, duration_ms: u64) {
        let generation = {
            let mut inner = self.shared.inner.lock();
            let generation = inner.generation.advance();
            inner.task = None;
            inner.state.begin(duration_ms);
            generation
        };

        log::info!("Countdown started: {}", format_time(duration_ms));

        if duration_ms == 0 {
            self.shared.callbacks.fire(Tick::Completed);
            return;
        }

        let weak = Arc::downgrade(&self.shared);
        let handle = spawn_repeating(Duration::from_millis(TIMER_TICK_MS), move || {
            run_tick(&weak, generation)
        });

        let mut inner = self.shared.inner.lock();
        // A callback on another thread may already have restarted the timer
        if inner.generation == generation && inner.state.is_running {
            inner.task = Some(handle);
        }
    }

    /// Halt ticking, keeping remaining time and duration
    pub fn stop(&self) {
        let mut inner = self.shared.inner.lock();
        inner.generation.advance();
        inner.task = None;
        inner.state.halt();
        log::debug!("Countdown stopped at {} ms", inner.state.remaining_ms);
    }

    /// Halt ticking and return to the never-started state
    pub fn reset(&self) {
        let mut inner = self.shared.inner.lock();
        inner.generation.advance();
        inner.task = None;
        inner.state.clear();
        log::debug!("Countdown reset");
    }

    pub fn state(&self) -> TimerState {
        self.shared.inner.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.shared.inner.lock().state.is_running
    }
}

fn run_tick(weak: &Weak<Shared>, generation: Generation) -> ControlFlow<()> {
    let Some(shared) = weak.upgrade() else {
        return ControlFlow::Break(());
    };

    let tick = {
        let mut inner = shared.inner.lock();
        if inner.generation != generation {
            return ControlFlow::Break(());
        }
        let tick = inner.state.tick();
        if !matches!(tick, Tick::Remaining(_)) {
            inner.task = None;
        }
        tick
    };

    if tick == Tick::Completed {
        log::info!("Countdown complete");
    }
    shared.callbacks.fire(tick);

    match tick {
        Tick::Remaining(_) => ControlFlow::Continue(()),
        Tick::Idle | Tick::Completed => ControlFlow::Break(()),
    }
}

/// Render a duration as `MM:SS`, or `HH:MM:SS` from one hour up.
///
/// Milliseconds round up to whole seconds, so 500 ms shows as `00:01`.
pub fn format_time(ms: u64) -> String {
    let total_seconds = ms.div_ceil(1000);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting_timer() -> (CountdownTimer, Arc<Mutex<Vec<u64>>>, Arc<AtomicU32>) {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let completions = Arc::new(AtomicU32::new(0));
        let tick_log = ticks.clone();
        let completed = completions.clone();
        let timer = CountdownTimer::new(
            TimerCallbacks::new()
                .on_tick(move |remaining| tick_log.lock().push(remaining))
                .on_complete(move || {
                    completed.fetch_add(1, Ordering::SeqCst);
                }),
        );
        (timer, ticks, completions)
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(500), "00:01");
        assert_eq!(format_time(65_000), "01:05");
        assert_eq!(format_time(3_665_000), "01:01:05");
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(3_600_000), "01:00:00");
        assert_eq!(format_time(3_599_001), "01:00:00");
    }

    #[test]
    fn test_state_ticks_to_completion() {
        let mut state = TimerState::default();
        state.begin(5000);
        assert_eq!(state.tick(), Tick::Remaining(4000));
        assert_eq!(state.tick(), Tick::Remaining(3000));
        assert_eq!(state.tick(), Tick::Remaining(2000));
        assert_eq!(state.tick(), Tick::Remaining(1000));
        assert_eq!(state.tick(), Tick::Completed);
        assert_eq!(state.remaining_ms, 0);
        assert!(!state.is_running);
        assert_eq!(state.duration_ms, Some(5000));
        assert_eq!(state.tick(), Tick::Idle);
    }

    #[test]
    fn test_state_floors_partial_second() {
        let mut state = TimerState::default();
        state.begin(1500);
        assert_eq!(state.tick(), Tick::Remaining(500));
        assert_eq!(state.tick(), Tick::Completed);
        assert_eq!(state.remaining_ms, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_completes_once() {
        let (timer, ticks, completions) = counting_timer();
        timer.start(5000);
        assert!(timer.is_running());

        tokio::time::sleep(Duration::from_millis(5500)).await;

        let state = timer.state();
        assert_eq!(state.remaining_ms, 0);
        assert!(!state.is_running);
        assert_eq!(state.duration_ms, Some(5000));
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert_eq!(*ticks.lock(), vec![4000, 3000, 2000, 1000, 0]);

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert_eq!(ticks.lock().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_keeps_remaining_time() {
        let (timer, ticks, completions) = counting_timer();
        timer.start(5000);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        timer.stop();

        tokio::time::sleep(Duration::from_millis(5000)).await;

        let state = timer.state();
        assert_eq!(state.remaining_ms, 3000);
        assert!(!state.is_running);
        assert_eq!(state.duration_ms, Some(5000));
        assert_eq!(ticks.lock().len(), 2);
        assert_eq!(completions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_state() {
        let (timer, _ticks, completions) = counting_timer();
        timer.start(2000);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        timer.reset();

        tokio::time::sleep(Duration::from_millis(3000)).await;

        assert_eq!(timer.state(), TimerState::default());
        assert_eq!(timer.state().duration_ms, None);
        assert_eq!(completions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_countdown() {
        let (timer, ticks, completions) = counting_timer();
        timer.start(5000);
        tokio::time::sleep(Duration::from_millis(500)).await;
        timer.start(3000);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(*ticks.lock(), vec![2000, 1000, 0]);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert_eq!(timer.state().duration_ms, Some(3000));

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert_eq!(ticks.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_completes_immediately() {
        let (timer, ticks, completions) = counting_timer();
        timer.start(0);

        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert!(!timer.is_running());
        assert_eq!(*ticks.lock(), vec![0]);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_can_restart_timer() {
        let slot: Arc<Mutex<Option<CountdownTimer>>> = Arc::new(Mutex::new(None));
        let completions = Arc::new(AtomicU32::new(0));
        let slot_ref = slot.clone();
        let completed = completions.clone();
        let timer = CountdownTimer::new(TimerCallbacks::new().on_complete(move || {
            if completed.fetch_add(1, Ordering::SeqCst) == 0 {
                if let Some(timer) = slot_ref.lock().as_ref() {
                    timer.start(1000);
                }
            }
        }));
        *slot.lock() = Some(timer.clone());

        timer.start(1000);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(completions.load(Ordering::SeqCst), 2);
        assert!(!timer.is_running());

        // break the cycle held by the callback
        slot.lock().take();
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_can_restart_with_zero_duration() {
        let slot: Arc<Mutex<Option<CountdownTimer>>> = Arc::new(Mutex::new(None));
        let completions = Arc::new(AtomicU32::new(0));
        let slot_ref = slot.clone();
        let completed = completions.clone();
        let timer = CountdownTimer::new(TimerCallbacks::new().on_complete(move || {
            if completed.fetch_add(1, Ordering::SeqCst) == 0 {
                if let Some(timer) = slot_ref.lock().clone() {
                    timer.start(0);
                }
            }
        }));
        *slot.lock() = Some(timer.clone());

        timer.start(1000);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(completions.load(Ordering::SeqCst), 2);
        assert_eq!(timer.state().duration_ms, Some(0));
        assert!(!timer.is_running());

        slot.lock().take();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_timer_stops_ticking() {
        let (timer, ticks, completions) = counting_timer();
        timer.start(5000);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(*ticks.lock(), vec![4000]);

        drop(timer);
        tokio::time::sleep(Duration::from_millis(6000)).await;
        assert_eq!(*ticks.lock(), vec![4000]);
        assert_eq!(completions.load(Ordering::SeqCst), 0);
    }
}
