use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Smallest transition accepted by a run, in seconds. Keeps the step count
/// computation away from a zero duration.
pub const MIN_TRANSITION_SECONDS: f64 = 0.001;

/// Longest span accepted anywhere, in seconds (about 31 years). Sums of a
/// whole journey stay far inside what [`Duration`] can hold.
pub const MAX_SPAN_SECONDS: f64 = 1.0e9;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub timeline: TimelineConfig,
    pub scene: SceneConfig,
    pub audio: AudioConfig,
    pub reflection: ReflectionConfig,
}

impl AppConfig {
    /// Reads a JSON configuration document. Missing sections fall back to
    /// their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parses a JSON configuration document held in memory.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Phase durations of a journey, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub top_duration: f64,
    pub mid_duration: f64,
    pub base_duration: f64,
    pub transition_duration: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            top_duration: 40.0,
            mid_duration: 40.0,
            base_duration: 40.0,
            transition_duration: 4.0,
        }
    }
}

impl TimelineConfig {
    /// Durations in seconds, in phase order.
    pub fn new(top: f64, mid: f64, base: f64, transition: f64) -> Self {
        Self {
            top_duration: top,
            mid_duration: mid,
            base_duration: base,
            transition_duration: transition,
        }
    }

    /// Clamped snapshot consumed by a single run. Negative (or NaN) phase
    /// durations become zero, huge ones are capped at [`MAX_SPAN_SECONDS`] and
    /// the transition is floored to [`MIN_TRANSITION_SECONDS`].
    pub fn spans(&self) -> TimelineSpans {
        TimelineSpans {
            top: clamped_seconds(self.top_duration),
            mid: clamped_seconds(self.mid_duration),
            base: clamped_seconds(self.base_duration),
            transition: clamped_seconds(self.transition_duration)
                .max(Duration::from_secs_f64(MIN_TRANSITION_SECONDS)),
        }
    }
}

/// Immutable, clamped view of a [`TimelineConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineSpans {
    pub top: Duration,
    pub mid: Duration,
    pub base: Duration,
    pub transition: Duration,
}

impl TimelineSpans {
    /// Nominal length of a run from start to the finished signal.
    pub fn total(&self) -> Duration {
        self.top + self.mid + self.base + self.transition * 2
    }
}

/// Converts configured seconds into a [`Duration`] without failing: negative
/// and non-finite values become zero, anything above [`MAX_SPAN_SECONDS`] is
/// capped.
pub fn clamped_seconds(seconds: f64) -> Duration {
    if !seconds.is_finite() {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(seconds.clamp(0.0, MAX_SPAN_SECONDS))
}

/// Scene layer placement shared by every layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Absolute scale of a fully emphasised layer.
    pub base_scale: f32,
    pub position: [f32; 3],
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            base_scale: 0.01,
            position: [0.0, 0.0, 0.0],
        }
    }
}

/// Configuration specific to the audio collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub ambient_loop: String,
    /// Offset in seconds between a phase boundary and its voice cue.
    pub cue_lead_in: f64,
    pub cues: CueClips,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ambient_loop: "Ambience_SoftSpring_loop".to_string(),
            cue_lead_in: 5.0,
            cues: CueClips::default(),
        }
    }
}

/// Clip names of the three voice cues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueClips {
    pub top: String,
    pub mid: String,
    pub base: String,
}

impl Default for CueClips {
    fn default() -> Self {
        Self {
            top: "Springtime_Top_Voice".to_string(),
            mid: "Springtime_Mid_Voice".to_string(),
            base: "Springtime_Base_Voice".to_string(),
        }
    }
}

/// Durations of the lighting-only ramps that close a journey, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectionConfig {
    pub settle_duration: f64,
    pub fade_duration: f64,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            settle_duration: 3.0,
            fade_duration: 2.5,
        }
    }
}
