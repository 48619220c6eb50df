//! Ambient loop decoding (Symphonia) and looping playback

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::buffer::StereoSample;
use crate::error::ResourceError;

/// A fully decoded loop, always converted to stereo
#[derive(Debug)]
pub struct AudioSample {
    pub name: String,
    pub sample_rate: u32,
    pub frames: Vec<StereoSample>,
}

impl AudioSample {
    pub fn from_frames(
        name: impl Into<String>,
        sample_rate: u32,
        frames: Vec<StereoSample>,
    ) -> Self {
        Self {
            name: name.into(),
            sample_rate,
            frames,
        }
    }

    /// Decode an audio file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ResourceError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let decode_err = |reason: String| ResourceError::Decode {
            path: display.clone(),
            reason,
        };

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        let file = File::open(path).map_err(|e| ResourceError::Open {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| decode_err(format!("unrecognised format: {}", e)))?;
        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| decode_err("no audio track".to_string()))?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| decode_err("unknown sample rate".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| decode_err(format!("no decoder: {}", e)))?;

        let mut frames = Vec::new();
        let mut scratch: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(decode_err(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // Corrupt frames are skipped, the rest of the loop is still usable
                Err(SymphoniaError::DecodeError(e)) => {
                    log::debug!("Skipping undecodable packet in {}: {}", display, e);
                    continue;
                }
                Err(e) => return Err(decode_err(e.to_string())),
            };

            let signal = *decoded.spec();
            let channels = signal.channels.count().max(1);
            let too_small = scratch
                .as_ref()
                .map_or(true, |buf| buf.capacity() < decoded.capacity() * channels);
            if too_small {
                scratch = Some(SampleBuffer::new(decoded.capacity() as u64, signal));
            }
            if let Some(buf) = scratch.as_mut() {
                buf.copy_interleaved_ref(decoded);
                append_interleaved(buf.samples(), channels, &mut frames);
            }
        }

        if frames.is_empty() {
            return Err(decode_err("file contains no audio".to_string()));
        }

        log::debug!(
            "Decoded {} ({} frames @ {} Hz)",
            name,
            frames.len(),
            sample_rate
        );

        Ok(Self::from_frames(name, sample_rate, frames))
    }

    pub fn duration_secs(&self) -> f32 {
        self.frames.len() as f32 / self.sample_rate as f32
    }
}

/// Fold interleaved samples of any channel count into stereo frames
fn append_interleaved(samples: &[f32], channels: usize, output: &mut Vec<StereoSample>) {
    for frame in samples.chunks_exact(channels) {
        let left = frame[0];
        let right = if channels > 1 { frame[1] } else { left };
        output.push(StereoSample::new(left, right));
    }
}

/// Looping player for one decoded sample.
///
/// Position advances by `speed_ratio` frames per output frame, which doubles
/// as sample rate conversion when the file and device rates differ.
#[derive(Debug)]
pub struct LoopPlayer {
    sample: Arc<AudioSample>,
    position: usize,
    fractional_position: f32,
    is_playing: bool,
    gain: f32,
    speed_ratio: f32,
}

impl LoopPlayer {
    pub fn new(sample: Arc<AudioSample>) -> Self {
        Self {
            sample,
            position: 0,
            fractional_position: 0.0,
            is_playing: false,
            gain: 1.0,
            speed_ratio: 1.0,
        }
    }

    /// Configure rate conversion from the sample's rate to `output_rate`
    pub fn with_output_rate(mut self, output_rate: u32) -> Self {
        if output_rate > 0 {
            self.set_speed_ratio(self.sample.sample_rate as f32 / output_rate as f32);
        }
        self
    }

    pub fn play(&mut self) {
        self.is_playing = true;
    }

    pub fn pause(&mut self) {
        self.is_playing = false;
    }

    pub fn rewind(&mut self) {
        self.position = 0;
        self.fractional_position = 0.0;
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
    }

    pub fn set_speed_ratio(&mut self, ratio: f32) {
        self.speed_ratio = ratio.clamp(0.1, 4.0);
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Produce the next output frame, wrapping to the start at the end
    pub fn next_sample(&mut self) -> StereoSample {
        if !self.is_playing {
            return StereoSample::silence();
        }
        let sample = &self.sample;
        let len = sample.frames.len();
        if len == 0 {
            return StereoSample::silence();
        }

        if self.position >= len {
            self.position %= len;
        }
        let current = sample.frames[self.position];
        // The loop seam interpolates into the first frame
        let next = sample.frames[(self.position + 1) % len];
        let out = current.lerp(next, self.fractional_position).scaled(self.gain);

        self.fractional_position += self.speed_ratio;
        while self.fractional_position >= 1.0 {
            self.fractional_position -= 1.0;
            self.position += 1;
        }
        if self.position >= len {
            self.position %= len;
        }

        out
    }
}
