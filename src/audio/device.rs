//! Output device enumeration and stream configuration

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{SampleFormat, SupportedBufferSize, SupportedStreamConfig, SupportedStreamConfigRange};
use serde::{Deserialize, Serialize};

use crate::error::ResourceError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

/// Preferred output stream settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_size: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            buffer_size: 1024,
        }
    }
}

fn device_err(context: &str, e: impl std::fmt::Display) -> ResourceError {
    ResourceError::Device(format!("{}: {}", context, e))
}

/// List available output devices
pub fn list_output_devices() -> Result<Vec<AudioDeviceInfo>, ResourceError> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let devices = host
        .output_devices()
        .map_err(|e| device_err("failed to enumerate devices", e))?;

    Ok(devices
        .filter_map(|device| device.name().ok())
        .map(|name| AudioDeviceInfo {
            is_default: Some(&name) == default_name.as_ref(),
            name,
        })
        .collect())
}

/// Output device by name, or the host default when `name` is None
pub fn get_output_device(name: Option<&str>) -> Result<cpal::Device, ResourceError> {
    let host = cpal::default_host();

    let Some(wanted) = name else {
        return host
            .default_output_device()
            .ok_or_else(|| ResourceError::Device("no default output device".to_string()));
    };

    let mut devices = host
        .output_devices()
        .map_err(|e| device_err("failed to enumerate devices", e))?;
    devices
        .find(|device| device.name().map(|n| n == wanted).unwrap_or(false))
        .ok_or_else(|| ResourceError::Device(format!("device '{}' not found", wanted)))
}

/// Pick an F32 stream config matching `preferred`, falling back to the device
/// default and then to any F32 range
pub fn get_supported_config(
    device: &cpal::Device,
    preferred: &AudioConfig,
) -> Result<cpal::StreamConfig, ResourceError> {
    let ranges: Vec<SupportedStreamConfigRange> = device
        .supported_output_configs()
        .map_err(|e| device_err("failed to query configs", e))?
        .collect();

    if let Some(config) = match_preferred(&ranges, preferred) {
        return Ok(config);
    }

    let default_config = device.default_output_config().ok();
    let config = fallback_config(default_config, &ranges)
        .ok_or_else(|| ResourceError::Device("device has no f32 output format".to_string()))?;

    log::debug!(
        "Preferred output config unavailable, using {} Hz, {} ch",
        config.sample_rate.0,
        config.channels
    );
    Ok(config)
}

fn buffer_size_for(range: &SupportedStreamConfigRange, frames: u32) -> cpal::BufferSize {
    match range.buffer_size() {
        SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&frames) => {
            cpal::BufferSize::Fixed(frames)
        }
        _ => cpal::BufferSize::Default,
    }
}

/// F32 range covering the preferred rate, exact channel count first
fn match_preferred(
    ranges: &[SupportedStreamConfigRange],
    preferred: &AudioConfig,
) -> Option<cpal::StreamConfig> {
    let rate = cpal::SampleRate(preferred.sample_rate);
    let usable = |range: &&SupportedStreamConfigRange| {
        range.sample_format() == SampleFormat::F32
            && range.min_sample_rate() <= rate
            && rate <= range.max_sample_rate()
    };

    let range = ranges
        .iter()
        .filter(usable)
        .find(|range| range.channels() == preferred.channels)
        .or_else(|| ranges.iter().find(usable))?;

    Some(cpal::StreamConfig {
        channels: range.channels(),
        sample_rate: rate,
        buffer_size: buffer_size_for(range, preferred.buffer_size),
    })
}

fn fallback_config(
    default_config: Option<SupportedStreamConfig>,
    ranges: &[SupportedStreamConfigRange],
) -> Option<cpal::StreamConfig> {
    let config = match default_config.filter(|c| c.sample_format() == SampleFormat::F32) {
        Some(config) => config,
        None => ranges
            .iter()
            .find(|range| range.sample_format() == SampleFormat::F32)?
            .clone()
            .with_max_sample_rate(),
    };

    Some(cpal::StreamConfig {
        channels: config.channels(),
        sample_rate: config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    })
}
