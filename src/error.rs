//! Error types shared by the audio backend and configuration layer

use thiserror::Error;

/// Failures raised by a loop resource or the loader that creates it.
///
/// None of these are fatal: the mixer logs them and keeps the affected
/// channel in a consistent, not-playing state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("audio device error: {0}")]
    Device(String),

    #[error("audio output is not available")]
    EngineUnavailable,

    #[error("voice command queue is full")]
    QueueFull,

    #[error("resource has been released")]
    Released,

    #[error("playback refused: {0}")]
    Refused(String),
}

/// Failures while reading the settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
