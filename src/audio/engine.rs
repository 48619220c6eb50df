//! Output engine: one cpal stream mixing every loaded loop
//!
//! The control side never touches the voices directly. Each [`EngineVoice`]
//! pushes [`VoiceCommand`]s into a ringbuf queue which the audio callback
//! drains at the top of every buffer before mixing.

use cpal::traits::{DeviceTrait, StreamTrait};
use parking_lot::Mutex;
use ringbuf::traits::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::buffer::{create_command_buffer, StereoSample};
use super::device::{self, AudioConfig};
use super::resource::{LoopResource, ResourceLoader};
use super::samples::{AudioSample, LoopPlayer};
use crate::error::ResourceError;

/// Capacity of the control → audio thread command queue
const COMMAND_QUEUE_SIZE: usize = 256;

/// Commands processed on the audio thread
pub enum VoiceCommand {
    Attach(usize, Box<LoopPlayer>),
    Play(usize),
    Pause(usize),
    SetGain(usize, f32),
    Rewind(usize),
    Detach(usize),
}

/// Audio-thread state: the voices and the receiving end of the command queue
pub struct VoiceMixer {
    commands: ringbuf::HeapCons<VoiceCommand>,
    voices: Vec<Option<LoopPlayer>>,
}

impl VoiceMixer {
    pub fn new(commands: ringbuf::HeapCons<VoiceCommand>) -> Self {
        Self {
            commands,
            voices: Vec::with_capacity(16),
        }
    }

    fn voice(&mut self, index: usize) -> Option<&mut LoopPlayer> {
        self.voices.get_mut(index).and_then(Option::as_mut)
    }

    fn apply(&mut self, command: VoiceCommand) {
        match command {
            VoiceCommand::Attach(index, player) => {
                if self.voices.len() <= index {
                    self.voices.resize_with(index + 1, || None);
                }
                self.voices[index] = Some(*player);
            }
            VoiceCommand::Play(index) => {
                if let Some(voice) = self.voice(index) {
                    voice.play();
                }
            }
            VoiceCommand::Pause(index) => {
                if let Some(voice) = self.voice(index) {
                    voice.pause();
                }
            }
            VoiceCommand::SetGain(index, gain) => {
                if let Some(voice) = self.voice(index) {
                    voice.set_gain(gain);
                }
            }
            VoiceCommand::Rewind(index) => {
                if let Some(voice) = self.voice(index) {
                    voice.rewind();
                }
            }
            VoiceCommand::Detach(index) => {
                if let Some(slot) = self.voices.get_mut(index) {
                    *slot = None;
                }
            }
        }
    }

    /// Drain pending commands, then fill an interleaved output buffer
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        while let Some(command) = self.commands.try_pop() {
            self.apply(command);
        }

        let channels = channels.max(1);
        for frame in output.chunks_mut(channels) {
            let mut mixed = StereoSample::silence();
            for voice in self.voices.iter_mut().flatten() {
                mixed += voice.next_sample();
            }
            let left = mixed.left.clamp(-1.0, 1.0);
            let right = mixed.right.clamp(-1.0, 1.0);

            match frame.len() {
                1 => frame[0] = (left + right) * 0.5,
                _ => {
                    frame[0] = left;
                    frame[1] = right;
                    for extra in frame.iter_mut().skip(2) {
                        *extra = 0.0;
                    }
                }
            }
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.iter().flatten().filter(|v| v.is_playing()).count()
    }
}

struct EngineShared {
    commands: Mutex<ringbuf::HeapProd<VoiceCommand>>,
    running: AtomicBool,
    next_voice: AtomicUsize,
}

impl EngineShared {
    fn send(&self, command: VoiceCommand) -> Result<(), ResourceError> {
        self.commands
            .lock()
            .try_push(command)
            .map_err(|_| ResourceError::QueueFull)
    }
}

/// Owns the output stream and hands out voices as loop resources
pub struct AudioEngine {
    shared: Arc<EngineShared>,
    audio_dir: PathBuf,
    output_rate: u32,
    // Kept alive for the lifetime of the engine; playback stops on drop
    _stream: Option<cpal::Stream>,
}

impl AudioEngine {
    /// Open the output stream on `device_name` (or the default device)
    pub fn open(
        audio_dir: impl Into<PathBuf>,
        device_name: Option<&str>,
        config: &AudioConfig,
    ) -> Result<Self, ResourceError> {
        let device = device::get_output_device(device_name)?;
        let stream_config = device::get_supported_config(&device, config)?;
        let channels = stream_config.channels as usize;
        let output_rate = stream_config.sample_rate.0;

        let (producer, consumer) = create_command_buffer(COMMAND_QUEUE_SIZE);
        let mut mixer = VoiceMixer::new(consumer);

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    mixer.render(data, channels);
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| ResourceError::Device(format!("failed to build stream: {}", e)))?;
        stream
            .play()
            .map_err(|e| ResourceError::Device(format!("failed to start stream: {}", e)))?;

        log::info!(
            "Audio output running on {} ({} Hz, {} ch)",
            device.name().unwrap_or_else(|_| "unknown device".to_string()),
            output_rate,
            channels
        );

        Ok(Self {
            shared: Arc::new(EngineShared {
                commands: Mutex::new(producer),
                running: AtomicBool::new(true),
                next_voice: AtomicUsize::new(0),
            }),
            audio_dir: audio_dir.into(),
            output_rate,
            _stream: Some(stream),
        })
    }

    /// Engine without an output stream. Loops still load, but every start
    /// fails with [`ResourceError::EngineUnavailable`].
    pub fn disabled(audio_dir: impl Into<PathBuf>) -> Self {
        let (producer, _consumer) = create_command_buffer(COMMAND_QUEUE_SIZE);
        Self {
            shared: Arc::new(EngineShared {
                commands: Mutex::new(producer),
                running: AtomicBool::new(false),
                next_voice: AtomicUsize::new(0),
            }),
            audio_dir: audio_dir.into(),
            output_rate: AudioConfig::default().sample_rate,
            _stream: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Resolve a catalog locator against the audio directory
    pub fn resolve(&self, locator: &str) -> PathBuf {
        resolve_locator(&self.audio_dir, locator)
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
    }
}

fn resolve_locator(audio_dir: &Path, locator: &str) -> PathBuf {
    let relative = locator.trim_start_matches('/');
    let relative = relative.strip_prefix("audio/").unwrap_or(relative);
    audio_dir.join(relative)
}

impl ResourceLoader for AudioEngine {
    fn load(&self, locator: &str) -> Result<Box<dyn LoopResource>, ResourceError> {
        let path = self.resolve(locator);
        let sample = Arc::new(AudioSample::load(&path)?);
        log::debug!(
            "Loaded loop {} ({:.1}s @ {} Hz)",
            sample.name,
            sample.duration_secs(),
            sample.sample_rate
        );

        let player = LoopPlayer::new(sample).with_output_rate(self.output_rate);
        let index = self.shared.next_voice.fetch_add(1, Ordering::Relaxed);
        if self.is_running() {
            self.shared.send(VoiceCommand::Attach(index, Box::new(player)))?;
        }

        Ok(Box::new(EngineVoice {
            shared: self.shared.clone(),
            index,
            released: false,
        }))
    }
}

/// Control-side handle to one voice in the engine
pub struct EngineVoice {
    shared: Arc<EngineShared>,
    index: usize,
    released: bool,
}

impl EngineVoice {
    fn send_quiet(&self, command: VoiceCommand) {
        if self.released || !self.shared.running.load(Ordering::Acquire) {
            return;
        }
        if let Err(e) = self.shared.send(command) {
            log::warn!("Voice {}: {}", self.index, e);
        }
    }
}

impl LoopResource for EngineVoice {
    fn start(&mut self) -> Result<(), ResourceError> {
        if self.released {
            return Err(ResourceError::Released);
        }
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(ResourceError::EngineUnavailable);
        }
        self.shared.send(VoiceCommand::Play(self.index))
    }

    fn pause(&mut self) {
        self.send_quiet(VoiceCommand::Pause(self.index));
    }

    fn set_volume(&mut self, volume: f32) {
        self.send_quiet(VoiceCommand::SetGain(self.index, volume));
    }

    fn rewind(&mut self) {
        self.send_quiet(VoiceCommand::Rewind(self.index));
    }

    fn release(&mut self) {
        self.send_quiet(VoiceCommand::Detach(self.index));
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_loop(value: f32) -> Box<LoopPlayer> {
        let sample = AudioSample::from_frames("dc", 44100, vec![StereoSample::mono(value); 8]);
        Box::new(LoopPlayer::new(Arc::new(sample)))
    }

    #[test]
    fn test_render_mixes_playing_voices() {
        let (mut tx, rx) = create_command_buffer(16);
        let mut mixer = VoiceMixer::new(rx);
        assert!(tx.try_push(VoiceCommand::Attach(0, constant_loop(0.25))).is_ok());
        assert!(tx.try_push(VoiceCommand::Attach(1, constant_loop(0.5))).is_ok());
        assert!(tx.try_push(VoiceCommand::Play(0)).is_ok());
        assert!(tx.try_push(VoiceCommand::Play(1)).is_ok());
        assert!(tx.try_push(VoiceCommand::SetGain(1, 0.5)).is_ok());

        let mut out = [0.0f32; 8];
        mixer.render(&mut out, 2);
        assert!(out.iter().all(|s| (s - 0.5).abs() < 1e-6));
        assert_eq!(mixer.active_voices(), 2);
    }

    #[test]
    fn test_paused_and_detached_voices_are_silent() {
        let (mut tx, rx) = create_command_buffer(16);
        let mut mixer = VoiceMixer::new(rx);
        assert!(tx.try_push(VoiceCommand::Attach(0, constant_loop(0.25))).is_ok());
        assert!(tx.try_push(VoiceCommand::Attach(2, constant_loop(0.5))).is_ok());
        assert!(tx.try_push(VoiceCommand::Play(0)).is_ok());
        assert!(tx.try_push(VoiceCommand::Play(2)).is_ok());
        assert!(tx.try_push(VoiceCommand::Pause(0)).is_ok());
        assert!(tx.try_push(VoiceCommand::Detach(2)).is_ok());

        let mut out = [1.0f32; 6];
        mixer.render(&mut out, 2);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn test_render_clips_and_fills_extra_channels() {
        let (mut tx, rx) = create_command_buffer(16);
        let mut mixer = VoiceMixer::new(rx);
        for i in 0..3 {
            assert!(tx.try_push(VoiceCommand::Attach(i, constant_loop(0.5))).is_ok());
            assert!(tx.try_push(VoiceCommand::Play(i)).is_ok());
        }

        let mut out = [0.5f32; 8];
        mixer.render(&mut out, 4);
        assert_eq!(out, [1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unknown_voice_commands_are_ignored() {
        let (mut tx, rx) = create_command_buffer(16);
        let mut mixer = VoiceMixer::new(rx);
        assert!(tx.try_push(VoiceCommand::Play(7)).is_ok());
        assert!(tx.try_push(VoiceCommand::Detach(7)).is_ok());
        let mut out = [0.0f32; 2];
        mixer.render(&mut out, 1);
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn test_disabled_engine_refuses_start() {
        let engine = AudioEngine::disabled("/tmp");
        let mut voice = EngineVoice {
            shared: engine.shared.clone(),
            index: 0,
            released: false,
        };
        assert_eq!(voice.start(), Err(ResourceError::EngineUnavailable));
        voice.release();
        assert_eq!(voice.start(), Err(ResourceError::Released));
    }

    #[test]
    fn test_locator_resolution() {
        let dir = Path::new("/srv/sounds");
        assert_eq!(resolve_locator(dir, "fire.mp3"), dir.join("fire.mp3"));
        assert_eq!(resolve_locator(dir, "/audio/rain.mp3"), dir.join("rain.mp3"));
    }
}
