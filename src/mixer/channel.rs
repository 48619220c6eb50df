//! A single mixer channel and its snapshot type

use serde::Serialize;

use crate::audio::LoopResource;

/// Target volume every channel starts with, and returns to on reset
pub const DEFAULT_VOLUME: f32 = 0.6;

/// Read-only view of a channel handed to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelState {
    pub is_playing: bool,
    pub volume: f32,
}

/// One looping sound: its resource, play state and user-set volume.
///
/// The applied resource volume is always `volume * multiplier`, where the
/// multiplier comes from an in-flight fade (1.0 otherwise).
pub(crate) struct Channel {
    id: String,
    source: Option<Box<dyn LoopResource>>,
    is_playing: bool,
    volume: f32,
}

impl Channel {
    pub fn new(id: impl Into<String>, mut source: Option<Box<dyn LoopResource>>) -> Self {
        if let Some(src) = source.as_mut() {
            src.set_volume(DEFAULT_VOLUME);
        }
        Self {
            id: id.into(),
            source,
            is_playing: false,
            volume: DEFAULT_VOLUME,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ChannelState {
        ChannelState {
            is_playing: self.is_playing,
            volume: self.volume,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Start the resource at the effective volume. On failure the channel
    /// stays (or becomes) not playing.
    pub fn start(&mut self, multiplier: f32) {
        let Some(source) = self.source.as_mut() else {
            log::warn!("Cannot play '{}': no audio loaded", self.id);
            self.is_playing = false;
            return;
        };

        source.set_volume(self.volume * multiplier);
        match source.start() {
            Ok(()) => {
                self.is_playing = true;
                log::debug!("Playing '{}' at {:.2}", self.id, self.volume);
            }
            Err(e) => {
                log::warn!("Failed to start '{}': {}", self.id, e);
                source.pause();
                self.is_playing = false;
            }
        }
    }

    pub fn halt(&mut self) {
        if let Some(source) = self.source.as_mut() {
            source.pause();
        }
        self.is_playing = false;
    }

    pub fn rewind(&mut self) {
        if let Some(source) = self.source.as_mut() {
            source.rewind();
        }
    }

    pub fn set_target(&mut self, volume: f32) {
        self.volume = volume;
    }

    pub fn apply_volume(&mut self, multiplier: f32) {
        if let Some(source) = self.source.as_mut() {
            source.set_volume(self.volume * multiplier);
        }
    }

    /// Stop and drop the resource. Later starts fail quietly.
    pub fn release(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.pause();
            source.release();
        }
        self.is_playing = false;
    }
}
