//! The static sound palette and sleep timer presets

use serde::Serialize;

/// One entry of the sound palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sound {
    pub id: &'static str,
    pub label: &'static str,
    /// File name resolved against the configured audio directory
    pub locator: &'static str,
    pub icon: &'static str,
}

pub const SOUNDS: &[Sound] = &[
    Sound {
        id: "fire",
        label: "Fire",
        locator: "fire.mp3",
        icon: "flame",
    },
    Sound {
        id: "ocean",
        label: "Ocean",
        locator: "ocean.mp3",
        icon: "waves",
    },
    Sound {
        id: "rain",
        label: "Rain",
        locator: "rain.mp3",
        icon: "cloud-rain",
    },
    Sound {
        id: "forest",
        label: "Forest",
        locator: "forest.mp3",
        icon: "trees",
    },
    Sound {
        id: "wind",
        label: "Wind",
        locator: "wind.mp3",
        icon: "wind",
    },
    Sound {
        id: "birds",
        label: "Birds",
        locator: "birds.mp3",
        icon: "bird",
    },
];

/// Sleep timer choice. `duration_ms == None` means no timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerPreset {
    pub key: &'static str,
    pub label: &'static str,
    pub duration_ms: Option<u64>,
}

const MINUTE_MS: u64 = 60 * 1000;

pub const TIMER_PRESETS: &[TimerPreset] = &[
    TimerPreset {
        key: "15",
        label: "15 minutes",
        duration_ms: Some(15 * MINUTE_MS),
    },
    TimerPreset {
        key: "30",
        label: "30 minutes",
        duration_ms: Some(30 * MINUTE_MS),
    },
    TimerPreset {
        key: "60",
        label: "60 minutes",
        duration_ms: Some(60 * MINUTE_MS),
    },
    TimerPreset {
        key: "90",
        label: "90 minutes",
        duration_ms: Some(90 * MINUTE_MS),
    },
    TimerPreset {
        key: "off",
        label: "Infinite",
        duration_ms: None,
    },
];

/// Look up a preset by key, accepting `infinite` as an alias for `off`
pub fn find_preset(key: &str) -> Option<&'static TimerPreset> {
    let key = key.trim().to_ascii_lowercase();
    let key = match key.as_str() {
        "infinite" | "none" => "off",
        other => other.trim_end_matches('m'),
    };
    TIMER_PRESETS.iter().find(|p| p.key == key)
}
