//! Core library for the ScentSync journey.
//!
//! A journey walks three staged scene layers (top, mid and base notes of a
//! fragrance) on a schedule, crossfading between them while the lighting warms
//! up, and ends in a reflection phase. Voice cues are scheduled alongside the
//! phases from the same configuration. Each module owns one piece of that
//! flow, leaf first: the lighting model, the scene state, the rendering and
//! audio collaborators, the stepped blender, the phase timeline, the cue
//! scheduler and the application-level experience on top.

pub mod audio;
pub mod blend;
pub mod config;
pub mod cues;
pub mod error;
pub mod experience;
pub mod lighting;
pub mod render;
pub mod scene;
pub mod timeline;

pub use audio::{AudioManager, ClipBackend, ClipEvent, MemoryBackend, TracingBackend};
pub use blend::{Completion, Crossfade, LightRamp, StepPlan};
pub use config::{
    AppConfig, AudioConfig, CueClips, ReflectionConfig, SceneConfig, TimelineConfig, TimelineSpans,
};
pub use cues::{Cue, CueSchedule, CueSet};
pub use error::{JourneyError, Result};
pub use experience::{Experience, ExperienceState, ExperienceStatus};
pub use lighting::{LightRole, LightSample, LightingState, Rgb};
pub use render::{HeadlessStage, Stage};
pub use scene::{Layer, VisualState};
pub use timeline::{JourneySnapshot, Phase, PhaseTimeline, RunHandle, RunId, TimelineEvent};
