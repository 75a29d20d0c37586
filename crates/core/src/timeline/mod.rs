//! Phase state machine of a journey.
//!
//! [`PhaseTimeline`] is the single owner of the phase, the visual state, the
//! lighting state and the stage. All of them live behind one lock. A run only
//! mutates them while holding that lock and after re-checking its
//! cancellation token, and [`PhaseTimeline::cancel`] cancels the token under
//! the same lock. Once `cancel` returns, the cancelled run can no longer touch
//! anything, and a new run never interleaves with the previous one.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::{
    blend::{
        suspend, Completion, Crossfade, LightRamp, LightTarget, REFLECTION_TARGET,
        WARM_FADE_TARGET,
    },
    JourneyError, Layer, LightRole, LightingState, Result, SceneConfig, Stage, TimelineConfig,
    TimelineSpans, VisualState,
};

const EVENT_CAPACITY: usize = 64;

/// Warmth at the start of the Top to Mid blend.
const TOP_WARMTH: f32 = 0.0;
/// Warmth once the Mid phase is reached.
const MID_WARMTH: f32 = 0.55;
/// Warmth once the Base phase is reached.
const BASE_WARMTH: f32 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Before the stage is installed.
    Idle,
    Top,
    Mid,
    Base,
    /// Terminal until reset.
    Reflection,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Top => "top",
            Phase::Mid => "mid",
            Phase::Base => "base",
            Phase::Reflection => "reflection",
        }
    }
}

/// Identifies one run of the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(u64);

impl RunId {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineEvent {
    PhaseEntered { run: RunId, phase: Phase },
    /// Emitted exactly once per run that reached `Reflection`. Cancelled runs
    /// never emit it.
    Finished { run: RunId },
}

/// Observer's view of a run. Tasks bound to the run (voice cues) derive
/// their cancellation from [`RunHandle::child_token`].
#[derive(Debug, Clone)]
pub struct RunHandle {
    id: RunId,
    cancel: CancellationToken,
}

impl RunHandle {
    /// Identifier carried by the events of this run.
    pub fn id(&self) -> RunId {
        self.id
    }

    /// Token cancelled together with the run, including when the run finishes.
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Whether the run is still in flight.
    pub fn is_live(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

/// Copy of the state owned by the timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JourneySnapshot {
    pub phase: Phase,
    pub visual: VisualState,
    pub lighting: LightingState,
}

struct ActiveRun {
    id: RunId,
    cancel: CancellationToken,
}

struct Core<S> {
    stage: S,
    scene: SceneConfig,
    installed: bool,
    phase: Phase,
    visual: VisualState,
    lighting: LightingState,
    run: Option<ActiveRun>,
    ramp: CancellationToken,
    next_run: u64,
}

impl<S: Stage> Core<S> {
    fn push_layer(&mut self, layer: Layer, emphasis: f32) {
        let emphasis = self.visual.set(layer, emphasis);
        if self.installed {
            self.stage
                .set_layer_scale(layer, emphasis * self.scene.base_scale);
        }
    }

    fn push_lighting(&mut self, lighting: LightingState) {
        self.lighting = lighting;
        if self.installed {
            for role in LightRole::ALL {
                self.stage.set_light(role, lighting.get(role));
            }
        }
    }

    fn apply_baseline(&mut self) {
        let baseline = VisualState::baseline();
        for layer in Layer::ALL {
            self.push_layer(layer, baseline.get(layer));
            if self.installed {
                self.stage.set_layer_position(layer, self.scene.position);
            }
        }
        self.push_lighting(LightingState::baseline());
    }

    fn cancel_run(&mut self) -> Option<RunId> {
        let run = self.run.take()?;
        run.cancel.cancel();
        Some(run.id)
    }

    fn replace_ramp(&mut self) -> CancellationToken {
        self.ramp.cancel();
        self.ramp = CancellationToken::new();
        self.ramp.clone()
    }

    /// Layer handed to a crossfade, or `None` when the stage lacks it.
    fn blend_layer(&self, layer: Layer) -> Option<Layer> {
        self.stage.has_layer(layer).then_some(layer)
    }
}

struct Shared<S> {
    core: Mutex<Core<S>>,
    events: broadcast::Sender<TimelineEvent>,
}

impl<S: Stage> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, Core<S>> {
        // Each step is applied whole under the lock, so the state behind a
        // poisoned lock is still a valid step.
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `mutate` unless `cancel` has fired. Returns whether it ran.
    fn apply<F>(&self, cancel: &CancellationToken, mutate: F) -> bool
    where
        F: FnOnce(&mut Core<S>),
    {
        let mut core = self.lock();
        if cancel.is_cancelled() {
            return false;
        }
        mutate(&mut core);
        true
    }

    fn emit(&self, event: TimelineEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn enter(&self, id: RunId, cancel: &CancellationToken, phase: Phase) -> bool {
        let entered = self.apply(cancel, |core| core.phase = phase);
        if entered {
            tracing::info!(run = id.get(), phase = phase.name(), "phase entered");
            self.emit(TimelineEvent::PhaseEntered { run: id, phase });
        }
        entered
    }

    async fn crossfade(
        &self,
        cancel: &CancellationToken,
        from: Layer,
        to: Layer,
        warmth: (f32, f32),
        duration: Duration,
    ) -> Completion {
        let fade = {
            let core = self.lock();
            Crossfade {
                from: core.blend_layer(from),
                to: core.blend_layer(to),
                start_warmth: warmth.0,
                end_warmth: warmth.1,
                duration,
            }
        };
        tracing::debug!(
            from = from.name(),
            to = to.name(),
            steps = fade.plan().steps(),
            "crossfade started"
        );

        fade.run(cancel, |frame| {
            self.apply(cancel, |core| {
                if let Some((layer, emphasis)) = frame.outgoing {
                    core.push_layer(layer, emphasis);
                }
                if let Some((layer, emphasis)) = frame.incoming {
                    core.push_layer(layer, emphasis);
                }
                core.push_lighting(frame.lighting);
            })
        })
        .await
    }

    async fn run_journey(&self, id: RunId, cancel: CancellationToken, spans: TimelineSpans) {
        let completed = self.advance(id, &cancel, spans).await;
        if completed.is_cancelled() {
            tracing::debug!(run = id.get(), "journey run cancelled");
            return;
        }

        let finished = {
            let mut core = self.lock();
            if cancel.is_cancelled() {
                false
            } else {
                core.phase = Phase::Reflection;
                // The run is over; release the slot and every task bound to it.
                core.run = None;
                cancel.cancel();
                true
            }
        };

        if finished {
            tracing::info!(run = id.get(), "journey finished");
            self.emit(TimelineEvent::PhaseEntered {
                run: id,
                phase: Phase::Reflection,
            });
            self.emit(TimelineEvent::Finished { run: id });
        }
    }

    /// Walks the phases after `Top` has been entered. Returns once `Base` has
    /// been held for its full span, or as soon as the run is cancelled.
    async fn advance(
        &self,
        id: RunId,
        cancel: &CancellationToken,
        spans: TimelineSpans,
    ) -> Completion {
        if suspend(spans.top, cancel).await.is_cancelled() {
            return Completion::Cancelled;
        }

        let top_to_mid = self
            .crossfade(cancel, Layer::Top, Layer::Mid, (TOP_WARMTH, MID_WARMTH), spans.transition)
            .await;
        if top_to_mid.is_cancelled() || !self.enter(id, cancel, Phase::Mid) {
            return Completion::Cancelled;
        }
        if suspend(spans.mid, cancel).await.is_cancelled() {
            return Completion::Cancelled;
        }

        let mid_to_base = self
            .crossfade(cancel, Layer::Mid, Layer::Base, (MID_WARMTH, BASE_WARMTH), spans.transition)
            .await;
        if mid_to_base.is_cancelled() || !self.enter(id, cancel, Phase::Base) {
            return Completion::Cancelled;
        }

        suspend(spans.base, cancel).await
    }

    async fn ramp_lighting(&self, target: LightTarget, duration: Duration) -> Result<Completion> {
        let (ramp, cancel) = {
            let mut core = self.lock();
            if !core.installed {
                return Err(JourneyError::StageNotInstalled);
            }
            let from = LightTarget {
                intensity: core.lighting.key.intensity,
                color: core.lighting.key.color,
            };
            let ramp = LightRamp {
                from,
                to: target,
                duration,
            };
            (ramp, core.replace_ramp())
        };

        let completion = ramp
            .run(&cancel, |lighting| {
                self.apply(&cancel, |core| core.push_lighting(*lighting))
            })
            .await;
        tracing::debug!(?completion, target = target.intensity, "lighting ramp ended");
        Ok(completion)
    }
}

/// Sequences the journey phases and owns everything they mutate.
///
/// Cloning yields another handle to the same timeline.
pub struct PhaseTimeline<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for PhaseTimeline<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: Stage> PhaseTimeline<S> {
    /// Creates an idle timeline. Nothing reaches the stage before [`PhaseTimeline::install`].
    pub fn new(stage: S, scene: SceneConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let core = Core {
            stage,
            scene,
            installed: false,
            phase: Phase::Idle,
            visual: VisualState::baseline(),
            lighting: LightingState::baseline(),
            run: None,
            ramp: CancellationToken::new(),
            next_run: 0,
        };

        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                events,
            }),
        }
    }

    /// Installs the stage and moves `Idle` to `Top` with the baseline applied.
    /// Returns `true` when a previous install already existed.
    pub fn install(&self) -> bool {
        let mut core = self.shared.lock();
        let existed = core.stage.install() || core.installed;
        if !core.installed {
            core.installed = true;
            core.apply_baseline();
            core.phase = Phase::Top;
            tracing::info!("stage installed");
        }
        existed
    }

    /// Receiver for phase entries and finished signals of every run.
    pub fn subscribe(&self) -> broadcast::Receiver<TimelineEvent> {
        self.shared.events.subscribe()
    }

    /// Starts a new run from `config`, first cancelling any run in flight and
    /// any lighting ramp. The configuration is captured as a clamped snapshot;
    /// later changes to `config` do not affect the run.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, config: &TimelineConfig) -> Result<RunHandle> {
        let spans = config.spans();
        let (id, cancel) = {
            let mut core = self.shared.lock();
            if !core.installed {
                return Err(JourneyError::StageNotInstalled);
            }
            if let Some(previous) = core.cancel_run() {
                tracing::debug!(run = previous.get(), "superseded by a new run");
            }
            core.replace_ramp();
            core.apply_baseline();
            core.phase = Phase::Top;

            core.next_run += 1;
            let id = RunId(core.next_run);
            let cancel = CancellationToken::new();
            core.run = Some(ActiveRun {
                id,
                cancel: cancel.clone(),
            });
            (id, cancel)
        };

        tracing::info!(run = id.get(), ?spans, "journey started");
        self.shared.emit(TimelineEvent::PhaseEntered {
            run: id,
            phase: Phase::Top,
        });

        let shared = Arc::clone(&self.shared);
        let run_cancel = cancel.clone();
        tokio::spawn(async move { shared.run_journey(id, run_cancel, spans).await });

        Ok(RunHandle { id, cancel })
    }

    /// Cancels the run in flight, if any. The cancelled run never emits
    /// [`TimelineEvent::Finished`] and leaves the state at its last applied step.
    pub fn cancel(&self) {
        if let Some(id) = self.shared.lock().cancel_run() {
            tracing::debug!(run = id.get(), "journey cancelled");
        }
    }

    /// Cancels any run or ramp, restores the baseline and enters `Top`.
    pub fn reset(&self) {
        let mut core = self.shared.lock();
        core.cancel_run();
        core.replace_ramp();
        core.apply_baseline();
        core.phase = Phase::Top;
        tracing::debug!("timeline reset");
    }

    /// Stops the lighting ramp in flight, if any. The lighting stays at the
    /// ramp's last applied step and the phase is untouched.
    pub fn cancel_ramp(&self) {
        self.shared.lock().replace_ramp();
        tracing::debug!("lighting ramp cancelled");
    }

    /// Ramps the lighting to the reflection rig. Leaves the phase alone.
    pub async fn settle_into_reflection(&self, duration: Duration) -> Result<Completion> {
        self.shared.ramp_lighting(REFLECTION_TARGET, duration).await
    }

    /// Ramps the lighting to a near-baseline warm rig, then resets whether or
    /// not the ramp was interrupted.
    pub async fn fade_out_and_reset(&self, duration: Duration) -> Result<Completion> {
        let completion = self.shared.ramp_lighting(WARM_FADE_TARGET, duration).await?;
        self.reset();
        Ok(completion)
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    pub fn is_installed(&self) -> bool {
        self.shared.lock().installed
    }

    /// Whether a run is currently in flight.
    pub fn is_running(&self) -> bool {
        self.shared.lock().run.is_some()
    }

    /// Consistent copy of phase, emphasis and lighting.
    pub fn snapshot(&self) -> JourneySnapshot {
        let core = self.shared.lock();
        JourneySnapshot {
            phase: core.phase,
            visual: core.visual,
            lighting: core.lighting,
        }
    }

    /// Gives read access to the stage while the state lock is held.
    pub fn inspect_stage<R>(&self, inspect: impl FnOnce(&S) -> R) -> R {
        inspect(&self.shared.lock().stage)
    }
}

impl<S> std::fmt::Debug for PhaseTimeline<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseTimeline").finish()
    }
}
