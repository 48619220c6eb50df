//! The loopable audio resource capability driven by the mixer
//!
//! The mixer never touches decoding or output directly. Each channel owns one
//! boxed [`LoopResource`] created by a [`ResourceLoader`] from the catalog
//! locator; the engine in [`super::engine`] is the production implementation.

use crate::error::ResourceError;

/// A looping audio source that can be started, paused, rewound and released
pub trait LoopResource: Send {
    /// Begin or resume looping playback from the current position
    fn start(&mut self) -> Result<(), ResourceError>;

    /// Halt playback, keeping the position
    fn pause(&mut self);

    /// Set the applied output volume (0.0 - 1.0)
    fn set_volume(&mut self, volume: f32);

    /// Move the playback position back to the start
    fn rewind(&mut self);

    /// Stop and free the underlying audio data. Further starts fail.
    fn release(&mut self);
}

/// Creates loop resources from catalog locators
pub trait ResourceLoader {
    fn load(&self, locator: &str) -> Result<Box<dyn LoopResource>, ResourceError>;
}

#[cfg(test)]
pub mod testing {
    //! In-memory resource that records what the mixer did to it

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Probe {
        pub playing: bool,
        pub volume: f32,
        pub rewinds: u32,
        pub starts: u32,
        pub released: bool,
        /// Volumes applied while playing, in order
        pub volume_log: Vec<f32>,
        pub refuse_start: bool,
    }

    pub struct RecordingResource {
        probe: Arc<Mutex<Probe>>,
    }

    impl LoopResource for RecordingResource {
        fn start(&mut self) -> Result<(), ResourceError> {
            let mut probe = self.probe.lock();
            if probe.released {
                return Err(ResourceError::Released);
            }
            if probe.refuse_start {
                return Err(ResourceError::Refused("autoplay blocked".to_string()));
            }
            probe.playing = true;
            probe.starts += 1;
            Ok(())
        }

        fn pause(&mut self) {
            self.probe.lock().playing = false;
        }

        fn set_volume(&mut self, volume: f32) {
            let mut probe = self.probe.lock();
            probe.volume = volume;
            if probe.playing {
                probe.volume_log.push(volume);
            }
        }

        fn rewind(&mut self) {
            self.probe.lock().rewinds += 1;
        }

        fn release(&mut self) {
            let mut probe = self.probe.lock();
            probe.playing = false;
            probe.released = true;
        }
    }

    /// Loader handing out recording resources, keyed by locator
    #[derive(Default, Clone)]
    pub struct RecordingLoader {
        probes: Arc<Mutex<HashMap<String, Arc<Mutex<Probe>>>>>,
        missing: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingLoader {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make loading `locator` fail
        pub fn fail_on(self, locator: &str) -> Self {
            self.missing.lock().push(locator.to_string());
            self
        }

        pub fn probe(&self, locator: &str) -> Arc<Mutex<Probe>> {
            self.probes
                .lock()
                .get(locator)
                .cloned()
                .unwrap_or_else(|| panic!("no resource loaded for {locator}"))
        }
    }

    impl ResourceLoader for RecordingLoader {
        fn load(&self, locator: &str) -> Result<Box<dyn LoopResource>, ResourceError> {
            if self.missing.lock().iter().any(|m| m == locator) {
                return Err(ResourceError::Open {
                    path: locator.to_string(),
                    reason: "not found".to_string(),
                });
            }
            let probe = Arc::new(Mutex::new(Probe::default()));
            self.probes.lock().insert(locator.to_string(), probe.clone());
            Ok(Box::new(RecordingResource { probe }))
        }
    }
}
