//! Sample frame type and the lock-free command queue to the audio thread

use ringbuf::{traits::*, HeapRb};

/// Stereo audio frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoSample {
    pub left: f32,
    pub right: f32,
}

impl StereoSample {
    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    pub fn mono(value: f32) -> Self {
        Self { left: value, right: value }
    }

    pub fn silence() -> Self {
        Self::default()
    }

    pub fn scaled(self, gain: f32) -> Self {
        Self::new(self.left * gain, self.right * gain)
    }

    /// Linear interpolation towards `other` by `frac` (0.0 - 1.0)
    pub fn lerp(self, other: Self, frac: f32) -> Self {
        Self::new(
            self.left * (1.0 - frac) + other.left * frac,
            self.right * (1.0 - frac) + other.right * frac,
        )
    }
}

impl std::ops::AddAssign for StereoSample {
    fn add_assign(&mut self, rhs: Self) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

/// Command queue for sending commands to the audio thread
pub type CommandBuffer<T> = (ringbuf::HeapProd<T>, ringbuf::HeapCons<T>);

pub fn create_command_buffer<T>(capacity: usize) -> CommandBuffer<T> {
    let rb = HeapRb::new(capacity);
    rb.split()
}
