//! Channel registry and fade engine
//!
//! [`AudioManager`] owns one [`Channel`] per catalog sound. Callers get
//! transport operations and [`ChannelState`] snapshots only; the registry
//! itself is never handed out. Fades run as a 100 ms repeating tick that
//! holds a weak reference to the registry, so no tick outlives the manager.

pub mod channel;
pub mod fade;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::audio::ResourceLoader;
use crate::catalog::Sound;
use crate::scheduler::{spawn_repeating, Generation, TickHandle};
use channel::Channel;
pub use channel::{ChannelState, DEFAULT_VOLUME};
pub use fade::{FadeOutcome, FadePlan, FADE_TICK_MS};

struct ActiveFade {
    plan: FadePlan,
    generation: Generation,
    done: Option<oneshot::Sender<FadeOutcome>>,
    _task: TickHandle,
}

impl ActiveFade {
    fn finish(mut self, outcome: FadeOutcome) {
        if let Some(done) = self.done.take() {
            let _ = done.send(outcome);
        }
    }
}

struct Registry {
    /// Catalog order, used for every bulk operation
    channels: Vec<Channel>,
    index: HashMap<String, usize>,
    fade: Option<ActiveFade>,
    fade_generation: Generation,
}

impl Registry {
    fn get(&self, id: &str) -> Option<&Channel> {
        self.index.get(id).map(|&i| &self.channels[i])
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Channel> {
        self.index.get(id).map(|&i| &mut self.channels[i])
    }

    fn multiplier(&self) -> f32 {
        self.fade.as_ref().map_or(1.0, |f| f.plan.multiplier())
    }

    fn cancel_fade(&mut self) {
        if let Some(fade) = self.fade.take() {
            self.fade_generation.advance();
            log::debug!("Fade-out superseded");
            fade.finish(FadeOutcome::Superseded);
        }
    }

    fn pause_all(&mut self) {
        for channel in &mut self.channels {
            if channel.is_playing() {
                channel.halt();
            }
        }
    }

    fn apply_multiplier(&mut self, multiplier: f32) {
        for channel in &mut self.channels {
            if channel.is_playing() {
                channel.apply_volume(multiplier);
            }
        }
    }

    fn release(&mut self) {
        self.cancel_fade();
        for channel in &mut self.channels {
            channel.release();
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.release();
    }
}

/// Owns every mixer channel. Cloning yields another handle to the same
/// registry; the channels are released when the last handle goes away or
/// on an explicit [`AudioManager::release`].
#[derive(Clone)]
pub struct AudioManager {
    shared: Arc<Mutex<Registry>>,
}

impl AudioManager {
    /// Create one channel per sound, loading each resource through `loader`.
    ///
    /// A sound that fails to load still gets a channel; it simply never plays.
    pub fn new(sounds: &[Sound], loader: &dyn ResourceLoader) -> Self {
        let mut channels = Vec::with_capacity(sounds.len());
        let mut index = HashMap::with_capacity(sounds.len());

        for sound in sounds {
            if index.contains_key(sound.id) {
                log::warn!("Duplicate sound id '{}' ignored", sound.id);
                continue;
            }
            let source = match loader.load(sound.locator) {
                Ok(source) => Some(source),
                Err(e) => {
                    log::error!("Failed to load '{}': {}", sound.id, e);
                    None
                }
            };
            index.insert(sound.id.to_string(), channels.len());
            channels.push(Channel::new(sound.id, source));
        }

        log::info!("Audio manager ready with {} channels", channels.len());

        Self {
            shared: Arc::new(Mutex::new(Registry {
                channels,
                index,
                fade: None,
                fade_generation: Generation::default(),
            })),
        }
    }

    /// Start or resume a channel at its target volume
    pub fn play(&self, id: &str) {
        let mut reg = self.shared.lock();
        let multiplier = reg.multiplier();
        if let Some(channel) = reg.get_mut(id) {
            channel.start(multiplier);
        }
    }

    /// Pause a channel, keeping its position
    pub fn pause(&self, id: &str) {
        if let Some(channel) = self.shared.lock().get_mut(id) {
            channel.halt();
        }
    }

    /// Set a channel's target volume, clamped to 0.0 - 1.0
    pub fn set_volume(&self, id: &str, volume: f32) {
        if volume.is_nan() {
            log::warn!("Ignoring NaN volume for '{}'", id);
            return;
        }
        let volume = volume.clamp(0.0, 1.0);

        let mut reg = self.shared.lock();
        let fading = reg.fade.is_some();
        if let Some(channel) = reg.get_mut(id) {
            channel.set_target(volume);
            // Mid-fade the next tick applies it with the current multiplier
            if channel.is_playing() && !fading {
                channel.apply_volume(1.0);
            }
        }
    }

    /// Start every channel that is not already playing
    pub fn play_all(&self) {
        let mut reg = self.shared.lock();
        let multiplier = reg.multiplier();
        for channel in &mut reg.channels {
            if !channel.is_playing() {
                channel.start(multiplier);
            }
        }
    }

    /// Pause every playing channel
    pub fn pause_all(&self) {
        self.shared.lock().pause_all();
    }

    /// Pause and rewind everything and restore default volumes.
    /// Cancels an in-flight fade.
    pub fn stop_all(&self) {
        let mut reg = self.shared.lock();
        reg.cancel_fade();
        for channel in &mut reg.channels {
            channel.halt();
            channel.rewind();
            channel.set_target(DEFAULT_VOLUME);
            channel.apply_volume(1.0);
        }
        log::info!("All channels stopped");
    }

    pub fn state(&self, id: &str) -> Option<ChannelState> {
        self.shared.lock().get(id).map(Channel::state)
    }

    /// Snapshots of every channel in catalog order
    pub fn states(&self) -> Vec<(String, ChannelState)> {
        self.shared
            .lock()
            .channels
            .iter()
            .map(|c| (c.id().to_string(), c.state()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn playing_count(&self) -> usize {
        self.shared
            .lock()
            .channels
            .iter()
            .filter(|c| c.is_playing())
            .count()
    }

    pub fn is_fading(&self) -> bool {
        self.shared.lock().fade.is_some()
    }

    /// Fade every playing channel to silence over `duration_ms`, then pause
    /// everything.
    ///
    /// Any fade already in flight is cancelled first and resolves as
    /// [`FadeOutcome::Superseded`]. Durations under one tick pause at once.
    /// Must be called from within a tokio runtime.
    pub async fn fade_out(&self, duration_ms: u64) -> FadeOutcome {
        let plan = FadePlan::new(duration_ms);

        let done = {
            let mut reg = self.shared.lock();
            reg.cancel_fade();

            if plan.is_degenerate() {
                log::info!("Fade of {} ms is under one tick, pausing now", duration_ms);
                reg.pause_all();
                return FadeOutcome::Completed;
            }

            let generation = reg.fade_generation.advance();
            let (tx, rx) = oneshot::channel();
            let weak = Arc::downgrade(&self.shared);
            let task = spawn_repeating(Duration::from_millis(FADE_TICK_MS), move || {
                fade_tick(&weak, generation)
            });
            reg.fade = Some(ActiveFade {
                plan,
                generation,
                done: Some(tx),
                _task: task,
            });
            log::info!("Fading out over {} ms ({} steps)", duration_ms, plan.steps());
            rx
        };

        done.await.unwrap_or(FadeOutcome::Superseded)
    }

    /// Cancel any fade, stop and release every resource.
    /// Safe to call more than once.
    pub fn release(&self) {
        self.shared.lock().release();
        log::debug!("Audio manager released");
    }
}

fn fade_tick(weak: &Weak<Mutex<Registry>>, generation: Generation) -> ControlFlow<()> {
    let Some(shared) = weak.upgrade() else {
        return ControlFlow::Break(());
    };
    let mut reg = shared.lock();

    let (multiplier, finished) = match reg.fade.as_mut() {
        Some(fade) if fade.generation == generation => {
            let multiplier = fade.plan.advance();
            (multiplier, fade.plan.is_finished())
        }
        _ => return ControlFlow::Break(()),
    };

    reg.apply_multiplier(multiplier);
    if !finished {
        return ControlFlow::Continue(());
    }

    let fade = reg.fade.take();
    reg.pause_all();
    log::info!("Fade-out complete, all channels paused");
    if let Some(fade) = fade {
        fade.finish(FadeOutcome::Completed);
    }
    ControlFlow::Break(())
}
