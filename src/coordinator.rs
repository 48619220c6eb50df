//! Page-level glue between the mixer, the sleep timer and the front-end
//!
//! [`Mixer`] forwards user intents to the [`AudioManager`] and the
//! [`CountdownTimer`], starts the fade-out when the sleep timer runs out, and
//! publishes a fresh [`MixerSnapshot`] on a watch channel after every change.
//! Front-ends render from snapshots only.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::sync::watch;

use crate::audio::ResourceLoader;
use crate::catalog::{Sound, TimerPreset};
use crate::mixer::{AudioManager, ChannelState, FadeOutcome};
use crate::timer::{CountdownTimer, TimerCallbacks, TimerState};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSnapshot {
    pub id: String,
    pub label: String,
    pub is_playing: bool,
    pub volume: f32,
}

/// Everything a front-end needs to draw the mixer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MixerSnapshot {
    pub channels: Vec<ChannelSnapshot>,
    pub all_playing: bool,
    pub timer: TimerState,
    /// Key of the selected sleep timer preset
    pub timer_preset: Option<&'static str>,
}

struct MixerShared {
    sounds: Vec<Sound>,
    manager: AudioManager,
    timer: CountdownTimer,
    fade_out_ms: u64,
    preset: Mutex<Option<&'static TimerPreset>>,
    updates: watch::Sender<MixerSnapshot>,
}

impl MixerShared {
    fn snapshot(&self) -> MixerSnapshot {
        let states = self.manager.states();
        let channels: Vec<ChannelSnapshot> = states
            .into_iter()
            .map(|(id, ChannelState { is_playing, volume })| {
                let label = self
                    .sounds
                    .iter()
                    .find(|s| s.id == id)
                    .map_or_else(|| id.clone(), |s| s.label.to_string());
                ChannelSnapshot {
                    id,
                    label,
                    is_playing,
                    volume,
                }
            })
            .collect();
        let all_playing = !channels.is_empty() && channels.iter().all(|c| c.is_playing);

        MixerSnapshot {
            channels,
            all_playing,
            timer: self.timer.state(),
            timer_preset: self.preset.lock().map(|p| p.key),
        }
    }

    fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }

    fn sleep_timer_elapsed(self: Arc<Self>) {
        log::info!("Sleep timer elapsed, fading out over {} ms", self.fade_out_ms);
        self.publish();

        let manager = self.manager.clone();
        let fade_out_ms = self.fade_out_ms;
        let weak = Arc::downgrade(&self);
        tokio::spawn(async move {
            let outcome = manager.fade_out(fade_out_ms).await;
            if outcome == FadeOutcome::Superseded {
                log::debug!("Sleep fade interrupted");
            }
            if let Some(shared) = weak.upgrade() {
                shared.publish();
            }
        });
    }
}

impl Drop for MixerShared {
    fn drop(&mut self) {
        self.timer.reset();
        self.manager.release();
    }
}

/// The mixer as seen by a front-end
pub struct Mixer {
    shared: Arc<MixerShared>,
}

impl Mixer {
    /// Build the mixer for `sounds`, loading every loop through `loader`
    pub fn new(sounds: &[Sound], loader: &dyn ResourceLoader, fade_out_ms: u64) -> Self {
        let manager = AudioManager::new(sounds, loader);
        let (updates, _) = watch::channel(MixerSnapshot::default());

        let shared = Arc::new_cyclic(|weak: &Weak<MixerShared>| {
            let on_tick = weak.clone();
            let on_complete = weak.clone();
            let timer = CountdownTimer::new(
                TimerCallbacks::new()
                    .on_tick(move |_| {
                        if let Some(shared) = on_tick.upgrade() {
                            shared.publish();
                        }
                    })
                    .on_complete(move || {
                        if let Some(shared) = on_complete.upgrade() {
                            shared.sleep_timer_elapsed();
                        }
                    }),
            );

            MixerShared {
                sounds: sounds.to_vec(),
                manager,
                timer,
                fade_out_ms,
                preset: Mutex::new(None),
                updates,
            }
        });
        shared.publish();

        Self { shared }
    }

    /// Receiver that sees a new snapshot after every state change
    pub fn subscribe(&self) -> watch::Receiver<MixerSnapshot> {
        self.shared.updates.subscribe()
    }

    pub fn snapshot(&self) -> MixerSnapshot {
        self.shared.snapshot()
    }

    pub fn state(&self, id: &str) -> Option<ChannelState> {
        self.shared.manager.state(id)
    }

    pub fn all_playing(&self) -> bool {
        let manager = &self.shared.manager;
        !manager.is_empty() && manager.playing_count() == manager.len()
    }

    pub fn timer_state(&self) -> TimerState {
        self.shared.timer.state()
    }

    pub fn is_fading(&self) -> bool {
        self.shared.manager.is_fading()
    }

    pub fn play(&self, id: &str) {
        self.shared.manager.play(id);
        self.shared.publish();
    }

    pub fn pause(&self, id: &str) {
        self.shared.manager.pause(id);
        self.shared.publish();
    }

    /// Flip a single channel between playing and paused
    pub fn toggle(&self, id: &str) {
        match self.shared.manager.state(id) {
            Some(state) if state.is_playing => self.shared.manager.pause(id),
            Some(_) => self.shared.manager.play(id),
            None => log::debug!("Toggle for unknown sound '{}'", id),
        }
        self.shared.publish();
    }

    pub fn set_volume(&self, id: &str, volume: f32) {
        self.shared.manager.set_volume(id, volume);
        self.shared.publish();
    }

    /// Pause everything when all channels play, otherwise start the rest
    pub fn toggle_all(&self) {
        if self.all_playing() {
            self.shared.manager.pause_all();
        } else {
            self.shared.manager.play_all();
        }
        self.shared.publish();
    }

    /// Stop and rewind all channels, restore default volumes, clear the timer
    pub fn reset(&self) {
        self.shared.manager.stop_all();
        self.shared.timer.reset();
        *self.shared.preset.lock() = None;
        self.shared.publish();
    }

    /// Switch the sleep timer to `preset`. The infinite preset leaves the
    /// timer idle.
    pub fn select_timer(&self, preset: &'static TimerPreset) {
        self.shared.timer.reset();
        *self.shared.preset.lock() = Some(preset);
        match preset.duration_ms {
            Some(duration_ms) if duration_ms > 0 => self.shared.timer.start(duration_ms),
            _ => log::info!("Sleep timer off"),
        }
        self.shared.publish();
    }

    /// Run the sleep timer for an arbitrary duration
    pub fn start_timer(&self, duration_ms: u64) {
        *self.shared.preset.lock() = None;
        self.shared.timer.start(duration_ms);
        self.shared.publish();
    }

    pub fn cancel_timer(&self) {
        self.shared.timer.reset();
        *self.shared.preset.lock() = None;
        self.shared.publish();
    }

    /// Stop the timer and release every audio resource
    pub fn shutdown(&self) {
        self.shared.timer.reset();
        self.shared.manager.release();
        self.shared.publish();
        log::info!("Mixer shut down");
    }
}
