use serde::{Deserialize, Serialize};

/// Lower bound of a layer emphasis. A layer is never scaled to exactly zero.
pub const MIN_EMPHASIS: f32 = 0.001;

/// Scene layers staged by the journey, one per phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    Top,
    Mid,
    Base,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Top, Layer::Mid, Layer::Base];

    /// Lower-case name used in logs and clip tables.
    pub fn name(self) -> &'static str {
        match self {
            Layer::Top => "top",
            Layer::Mid => "mid",
            Layer::Base => "base",
        }
    }
}

/// Relative emphasis of every layer, each within `[MIN_EMPHASIS, 1.0]`.
/// The stage multiplies these by the configured base scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualState {
    pub top: f32,
    pub mid: f32,
    pub base: f32,
}

impl VisualState {
    /// Top layer fully shown, the others collapsed to the floor.
    pub fn baseline() -> Self {
        Self {
            top: 1.0,
            mid: MIN_EMPHASIS,
            base: MIN_EMPHASIS,
        }
    }

    /// Emphasis of `layer`.
    pub fn get(&self, layer: Layer) -> f32 {
        match layer {
            Layer::Top => self.top,
            Layer::Mid => self.mid,
            Layer::Base => self.base,
        }
    }

    /// Stores `emphasis` clamped to the valid range and returns the stored value.
    pub fn set(&mut self, layer: Layer, emphasis: f32) -> f32 {
        let value = clamp_emphasis(emphasis);
        match layer {
            Layer::Top => self.top = value,
            Layer::Mid => self.mid = value,
            Layer::Base => self.base = value,
        }
        value
    }
}

impl Default for VisualState {
    fn default() -> Self {
        Self::baseline()
    }
}

/// Keeps emphasis within `MIN_EMPHASIS..=1`. NaN maps to the floor.
pub fn clamp_emphasis(emphasis: f32) -> f32 {
    if emphasis.is_nan() {
        MIN_EMPHASIS
    } else {
        emphasis.clamp(MIN_EMPHASIS, 1.0)
    }
}
