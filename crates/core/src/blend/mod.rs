//! Stepped, cancellable interpolation at a fixed cadence.
//!
//! Both scene crossfades and the lighting-only ramps run on a [`StepPlan`]:
//! `max(round(duration * 30), 1)` steps, each followed by a sleep of
//! `duration / steps` except the last. Cancellation is observed at the sleeps
//! and by the step callback, never in the middle of a step, so a cancelled
//! blend stays exactly at its last applied step.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{
    lighting::{lerp, Rgb},
    scene::MIN_EMPHASIS,
    Layer, LightingState,
};

/// Fixed update cadence of every blend.
pub const UPDATES_PER_SECOND: f64 = 30.0;

/// How a cancellable operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Finished,
    Cancelled,
}

impl Completion {
    pub fn is_cancelled(self) -> bool {
        self == Completion::Cancelled
    }
}

/// Number of interpolation steps for a blend of `duration`.
pub fn step_count(duration: Duration) -> u32 {
    let steps = (duration.as_secs_f64() * UPDATES_PER_SECOND).round();
    (steps as u32).max(1)
}

/// Sleeps for `span` unless `cancel` fires first. A zero span does not
/// suspend at all but still reports an earlier cancellation.
pub async fn suspend(span: Duration, cancel: &CancellationToken) -> Completion {
    if cancel.is_cancelled() {
        return Completion::Cancelled;
    }
    if span.is_zero() {
        return Completion::Finished;
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Completion::Cancelled,
        _ = tokio::time::sleep(span) => Completion::Finished,
    }
}

/// Step count and interval of one blend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    steps: u32,
    interval: Duration,
}

impl StepPlan {
    /// Plan for a blend lasting `duration`.
    pub fn for_duration(duration: Duration) -> Self {
        let steps = step_count(duration);
        Self {
            steps,
            interval: duration / steps,
        }
    }

    /// Number of updates, never zero.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Pause before each update.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Progress of `step`; the final step is exactly `1.0`.
    pub fn progress(&self, step: u32) -> f32 {
        if step >= self.steps {
            1.0
        } else {
            step as f32 / self.steps as f32
        }
    }

    /// Calls `apply` with the progress of every step in `0..=steps`.
    ///
    /// `apply` returns `false` when its owner refused the step, which ends the
    /// blend as cancelled.
    pub async fn drive<F>(&self, cancel: &CancellationToken, mut apply: F) -> Completion
    where
        F: FnMut(f32) -> bool,
    {
        for step in 0..=self.steps {
            if !apply(self.progress(step)) {
                return Completion::Cancelled;
            }
            if step < self.steps && suspend(self.interval, cancel).await.is_cancelled() {
                return Completion::Cancelled;
            }
        }
        Completion::Finished
    }
}

/// Crossfade from an outgoing to an incoming layer while the lighting warms.
/// Either layer may be absent; the other side and the lighting still update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossfade {
    pub from: Option<Layer>,
    pub to: Option<Layer>,
    pub start_warmth: f32,
    pub end_warmth: f32,
    pub duration: Duration,
}

/// Values applied by one crossfade step. Emphasis values are relative and get
/// multiplied by the base scale when pushed to the stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossfadeFrame {
    pub progress: f32,
    pub outgoing: Option<(Layer, f32)>,
    pub incoming: Option<(Layer, f32)>,
    pub warmth: f32,
    pub lighting: LightingState,
}

impl Crossfade {
    pub fn plan(&self) -> StepPlan {
        StepPlan::for_duration(self.duration)
    }

    /// Scales, warmth and lighting at `progress`.
    pub fn frame(&self, progress: f32) -> CrossfadeFrame {
        // In and out share the same linear curve.
        let inverse = 1.0 - progress;
        let warmth = lerp(self.start_warmth, self.end_warmth, progress);

        CrossfadeFrame {
            progress,
            outgoing: self.from.map(|layer| (layer, inverse.max(MIN_EMPHASIS))),
            incoming: self.to.map(|layer| (layer, progress.max(MIN_EMPHASIS))),
            warmth,
            lighting: LightingState::blend(warmth),
        }
    }

    pub async fn run<F>(&self, cancel: &CancellationToken, mut apply: F) -> Completion
    where
        F: FnMut(&CrossfadeFrame) -> bool,
    {
        self.plan()
            .drive(cancel, |progress| apply(&self.frame(progress)))
            .await
    }
}

/// Key light endpoint of a lighting-only ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightTarget {
    pub intensity: f32,
    pub color: Rgb,
}

/// Target of the "settle into reflection" ramp.
pub const REFLECTION_TARGET: LightTarget = LightTarget {
    intensity: 1100.0,
    color: Rgb::new(1.0, 0.93, 0.85),
};

/// Near-baseline warm target of the "fade out and reset" ramp.
pub const WARM_FADE_TARGET: LightTarget = LightTarget {
    intensity: 900.0,
    color: Rgb::new(0.99, 0.94, 0.89),
};

/// Interpolates the key light directly between two endpoints, bypassing
/// warmth. Fill and ambient follow at their fixed fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRamp {
    pub from: LightTarget,
    pub to: LightTarget,
    pub duration: Duration,
}

impl LightRamp {
    pub fn plan(&self) -> StepPlan {
        StepPlan::for_duration(self.duration)
    }

    /// Uniform rig at `progress` between the two key lights.
    pub fn frame(&self, progress: f32) -> LightingState {
        LightingState::uniform(
            lerp(self.from.intensity, self.to.intensity, progress),
            self.from.color.lerp(self.to.color, progress),
        )
    }

    pub async fn run<F>(&self, cancel: &CancellationToken, mut apply: F) -> Completion
    where
        F: FnMut(&LightingState) -> bool,
    {
        self.plan()
            .drive(cancel, |progress| apply(&self.frame(progress)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn top_to_mid(duration: Duration) -> Crossfade {
        Crossfade {
            from: Some(Layer::Top),
            to: Some(Layer::Mid),
            start_warmth: 0.0,
            end_warmth: 0.55,
            duration,
        }
    }

    #[test]
    fn step_count_follows_thirty_updates_per_second() {
        assert_eq!(step_count(Duration::from_secs(4)), 120);
        assert_eq!(step_count(Duration::from_millis(100)), 3);
        assert_eq!(step_count(Duration::from_millis(1)), 1);
        assert_eq!(step_count(Duration::ZERO), 1);
    }

    #[test]
    fn frames_use_the_same_curve_for_both_layers() {
        let fade = top_to_mid(Duration::from_secs(1));

        let first = fade.frame(0.0);
        assert_eq!(first.outgoing, Some((Layer::Top, 1.0)));
        assert_eq!(first.incoming, Some((Layer::Mid, MIN_EMPHASIS)));
        assert_eq!(first.lighting, LightingState::blend(0.0));

        let quarter = fade.frame(0.25);
        assert_eq!(quarter.outgoing, Some((Layer::Top, 0.75)));
        assert_eq!(quarter.incoming, Some((Layer::Mid, 0.25)));

        let last = fade.frame(1.0);
        assert_eq!(last.outgoing, Some((Layer::Top, MIN_EMPHASIS)));
        assert_eq!(last.incoming, Some((Layer::Mid, 1.0)));
        assert!((last.warmth - 0.55).abs() < 1e-6);
    }

    #[test]
    fn missing_layers_only_skip_their_side() {
        let fade = Crossfade {
            from: None,
            ..top_to_mid(Duration::from_secs(1))
        };
        let frame = fade.frame(0.5);

        assert_eq!(frame.outgoing, None);
        assert_eq!(frame.incoming, Some((Layer::Mid, 0.5)));
        assert_eq!(frame.lighting, LightingState::blend(0.275));
    }

    #[test]
    fn light_ramp_interpolates_intensity_and_color() {
        let ramp = LightRamp {
            from: LightTarget {
                intensity: 4000.0,
                color: Rgb::new(0.95, 0.97, 1.0),
            },
            to: REFLECTION_TARGET,
            duration: Duration::from_secs(3),
        };

        assert_eq!(ramp.frame(0.0).key.intensity, 4000.0);
        let end = ramp.frame(1.0);
        assert_eq!(end.key.intensity, 1100.0);
        assert_eq!(end.key.color, REFLECTION_TARGET.color);
        assert!((end.fill.intensity - 495.0).abs() < 1e-3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_applies_every_step_and_reaches_target() {
        let fade = top_to_mid(Duration::from_secs(1));
        let cancel = CancellationToken::new();
        let started = Instant::now();
        let mut frames = Vec::new();

        let completion = fade
            .run(&cancel, |frame| {
                frames.push(*frame);
                true
            })
            .await;

        assert_eq!(completion, Completion::Finished);
        assert_eq!(frames.len(), 31);
        assert_eq!(frames.last().map(|f| f.progress), Some(1.0));
        assert!(started.elapsed() >= Duration::from_millis(990));
        assert!(started.elapsed() < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_at_the_last_applied_step() {
        let fade = top_to_mid(Duration::from_secs(1));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            trigger.cancel();
        });

        let mut frames = Vec::new();
        let completion = fade
            .run(&cancel, |frame| {
                frames.push(*frame);
                true
            })
            .await;

        assert_eq!(completion, Completion::Cancelled);
        assert!(frames.len() > 1 && frames.len() < 31);
        assert!(frames.last().map(|f| f.progress).unwrap_or(1.0) < 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn refused_step_ends_the_blend() {
        let fade = top_to_mid(Duration::from_secs(1));
        let cancel = CancellationToken::new();
        let mut applied = 0;

        let completion = fade
            .run(&cancel, |_| {
                applied += 1;
                applied < 3
            })
            .await;

        assert_eq!(completion, Completion::Cancelled);
        assert_eq!(applied, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_span_does_not_suspend() {
        let cancel = CancellationToken::new();
        let started = Instant::now();

        assert_eq!(suspend(Duration::ZERO, &cancel).await, Completion::Finished);
        assert_eq!(started.elapsed(), Duration::ZERO);

        cancel.cancel();
        assert_eq!(suspend(Duration::ZERO, &cancel).await, Completion::Cancelled);
    }
}
