//! Pure mapping from a warmth scalar (or an explicit key intensity and color)
//! to the three light roles of the stage.

use serde::{Deserialize, Serialize};

/// Color applied to every role at the cool end of the warmth range.
pub const COOL_COLOR: Rgb = Rgb::new(0.95, 0.97, 1.0);
/// Color applied to every role at the warm end of the warmth range.
pub const WARM_COLOR: Rgb = Rgb::new(1.0, 0.88, 0.8);

/// Key intensity of the baseline rig.
pub const BASELINE_INTENSITY: f32 = 4000.0;

/// Fill intensity as a fraction of the key intensity on the uniform path.
pub const FILL_FRACTION: f32 = 0.45;
/// Ambient intensity as a fraction of the key intensity on the uniform path.
pub const AMBIENT_FRACTION: f32 = 0.25;

/// `(cool, warm)` intensity endpoints per role on the warmth path.
const KEY_RANGE: (f32, f32) = (4000.0, 2600.0);
const FILL_RANGE: (f32, f32) = (1800.0, 1100.0);
const AMBIENT_RANGE: (f32, f32) = (900.0, 550.0);

/// Linear RGB color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    /// Linear RGB components in `0..=1`.
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Component-wise interpolation towards `target`; `t` is clamped.
    pub fn lerp(self, target: Rgb, t: f32) -> Rgb {
        Rgb {
            r: lerp(self.r, target.r, t),
            g: lerp(self.g, target.g, t),
            b: lerp(self.b, target.b, t),
        }
    }
}

/// Lights driven by the journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightRole {
    Key,
    Fill,
    Ambient,
}

impl LightRole {
    pub const ALL: [LightRole; 3] = [LightRole::Key, LightRole::Fill, LightRole::Ambient];
}

/// Intensity and color of one light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightSample {
    pub intensity: f32,
    pub color: Rgb,
}

/// Complete lighting of the stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightingState {
    pub key: LightSample,
    pub fill: LightSample,
    pub ambient: LightSample,
}

impl LightingState {
    /// Cool rig applied on install and reset.
    pub fn baseline() -> Self {
        Self::uniform(BASELINE_INTENSITY, COOL_COLOR)
    }

    /// Warmth path: every role interpolates its own intensity range while
    /// sharing one color. `warmth` is clamped to `[0, 1]`.
    pub fn blend(warmth: f32) -> Self {
        let amount = if warmth.is_nan() { 0.0 } else { warmth.clamp(0.0, 1.0) };
        let color = COOL_COLOR.lerp(WARM_COLOR, amount);
        let sample = |(cool, warm): (f32, f32)| LightSample {
            intensity: lerp(cool, warm, amount),
            color,
        };

        Self {
            key: sample(KEY_RANGE),
            fill: sample(FILL_RANGE),
            ambient: sample(AMBIENT_RANGE),
        }
    }

    /// Uniform path used by the lighting-only ramps: fill and ambient follow
    /// the key intensity at fixed fractions.
    pub fn uniform(key_intensity: f32, color: Rgb) -> Self {
        Self {
            key: LightSample {
                intensity: key_intensity,
                color,
            },
            fill: LightSample {
                intensity: key_intensity * FILL_FRACTION,
                color,
            },
            ambient: LightSample {
                intensity: key_intensity * AMBIENT_FRACTION,
                color,
            },
        }
    }

    /// Sample for one light of the rig.
    pub fn get(&self, role: LightRole) -> LightSample {
        match role {
            LightRole::Key => self.key,
            LightRole::Fill => self.fill,
            LightRole::Ambient => self.ambient,
        }
    }
}

impl Default for LightingState {
    fn default() -> Self {
        Self::baseline()
    }
}

pub(crate) fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn blend_endpoints_match_role_ranges() {
        let cool = LightingState::blend(0.0);
        assert_eq!(cool.key.intensity, 4000.0);
        assert_eq!(cool.fill.intensity, 1800.0);
        assert_eq!(cool.ambient.intensity, 900.0);
        assert_eq!(cool.key.color, COOL_COLOR);

        let warm = LightingState::blend(1.0);
        assert!(approx(warm.key.intensity, 2600.0));
        assert!(approx(warm.fill.intensity, 1100.0));
        assert!(approx(warm.ambient.intensity, 550.0));
        assert_eq!(warm.ambient.color, WARM_COLOR);
    }

    #[test]
    fn blend_clamps_warmth() {
        assert_eq!(LightingState::blend(-2.0), LightingState::blend(0.0));
        assert_eq!(LightingState::blend(7.5), LightingState::blend(1.0));
        assert_eq!(LightingState::blend(f32::NAN), LightingState::blend(0.0));
    }

    #[test]
    fn blend_midpoint_is_linear() {
        let half = LightingState::blend(0.5);
        assert!(approx(half.key.intensity, 3300.0));
        assert!(approx(half.key.color.g, 0.925));
    }

    #[test]
    fn uniform_uses_fixed_fractions() {
        let state = LightingState::uniform(1000.0, WARM_COLOR);
        assert_eq!(state.get(LightRole::Fill).intensity, 450.0);
        assert_eq!(state.get(LightRole::Ambient).intensity, 250.0);
        assert_eq!(state.get(LightRole::Fill).color, WARM_COLOR);
    }
}
