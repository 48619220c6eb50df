//! Audio backend for the mixer
//!
//! Provides the loop resource capability the mixer drives, and its
//! production implementation:
//! - Loop decoding via Symphonia
//! - Looping voices mixed into a single cpal output stream
//! - Lock-free command queue from the control side to the audio thread

pub mod buffer;
pub mod device;
pub mod engine;
pub mod resource;
pub mod samples;

pub use engine::AudioEngine;
pub use resource::{LoopResource, ResourceLoader};
