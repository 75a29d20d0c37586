//! Voice cues scheduled relative to the start of a run.
//!
//! Offsets are derived from the timeline configuration once, when the cues are
//! armed. They are not re-synchronised to actual phase entries.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    blend::suspend, config::clamped_seconds, AudioConfig, AudioManager, Layer, RunHandle, RunId, TimelineConfig,
};

/// One voice cue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub layer: Layer,
    pub clip: String,
    /// Delay after run start.
    pub offset: Duration,
}

/// The three voice cues of a journey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueSchedule {
    cues: [Cue; 3],
}

impl CueSchedule {
    /// Top plays after the lead-in, mid after the top phase and one transition,
    /// base after the top and mid phases and two transitions.
    pub fn from_config(timeline: &TimelineConfig, audio: &AudioConfig) -> Self {
        let spans = timeline.spans();
        let lead_in = clamped_seconds(audio.cue_lead_in);

        let cue = |layer: Layer, clip: &str, offset: Duration| Cue {
            layer,
            clip: clip.to_string(),
            offset,
        };

        Self {
            cues: [
                cue(Layer::Top, &audio.cues.top, lead_in),
                cue(Layer::Mid, &audio.cues.mid, spans.top + spans.transition + lead_in),
                cue(
                    Layer::Base,
                    &audio.cues.base,
                    spans.top + spans.mid + spans.transition * 2 + lead_in,
                ),
            ],
        }
    }

    /// Cues in firing order.
    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    /// Offset of the cue announcing `layer`.
    pub fn offset(&self, layer: Layer) -> Duration {
        self.cues
            .iter()
            .find(|cue| cue.layer == layer)
            .map(|cue| cue.offset)
            .unwrap_or_default()
    }
}

/// Armed cues of one run.
///
/// The cues are children of the run: they stop firing once the run is
/// cancelled, superseded or finished. [`CueSet::cancel`] additionally stops any
/// voiceover that is already playing. Dropping the set cancels un-fired cues.
#[derive(Debug)]
pub struct CueSet {
    run: RunId,
    cancel: CancellationToken,
    audio: Arc<AudioManager>,
    tasks: Vec<JoinHandle<()>>,
}

impl CueSet {
    /// Spawns one delayed task per cue. Must be called from within a tokio
    /// runtime.
    pub fn arm(run: &RunHandle, schedule: &CueSchedule, audio: Arc<AudioManager>) -> Self {
        let cancel = run.child_token();
        let tasks = schedule
            .cues()
            .iter()
            .cloned()
            .map(|cue| {
                let cancel = cancel.clone();
                let audio = Arc::clone(&audio);
                let run = run.id();
                tokio::spawn(async move { fire(run, cue, cancel, audio).await })
            })
            .collect();

        tracing::debug!(run = run.id().get(), "voice cues armed");
        Self {
            run: run.id(),
            cancel,
            audio,
            tasks,
        }
    }

    /// Run the cues belong to.
    pub fn run(&self) -> RunId {
        self.run
    }

    /// Whether any cue is still waiting to fire.
    pub fn is_pending(&self) -> bool {
        !self.cancel.is_cancelled() && self.tasks.iter().any(|task| !task.is_finished())
    }

    /// Cancels un-fired cues and stops every playing voiceover.
    pub fn cancel(self) {
        self.cancel.cancel();
        self.audio.stop_all();
        tracing::debug!(run = self.run.get(), "voice cues cancelled");
    }
}

impl Drop for CueSet {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn fire(run: RunId, cue: Cue, cancel: CancellationToken, audio: Arc<AudioManager>) {
    if suspend(cue.offset, &cancel).await.is_cancelled() {
        return;
    }

    if audio.play_once_if(&cue.clip, || !cancel.is_cancelled()) {
        tracing::info!(run = run.get(), cue = cue.layer.name(), clip = %cue.clip, "voice cue fired");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AudioConfig, ClipEvent, HeadlessStage, MemoryBackend, PhaseTimeline, SceneConfig};
    use tokio::time::sleep;

    fn schedule(config: &TimelineConfig) -> CueSchedule {
        CueSchedule::from_config(config, &AudioConfig::default())
    }

    fn rig() -> (PhaseTimeline<HeadlessStage>, Arc<MemoryBackend>, Arc<AudioManager>) {
        let timeline = PhaseTimeline::new(HeadlessStage::new(), SceneConfig::default());
        timeline.install();
        let backend = Arc::new(MemoryBackend::new());
        let audio = Arc::new(AudioManager::new(backend.clone()));
        (timeline, backend, audio)
    }

    #[test]
    fn offsets_follow_the_phase_timeline() {
        let cues = schedule(&TimelineConfig::new(40.0, 40.0, 40.0, 4.0));

        assert_eq!(cues.offset(Layer::Top), Duration::from_secs(5));
        assert_eq!(cues.offset(Layer::Mid), Duration::from_secs(49));
        assert_eq!(cues.offset(Layer::Base), Duration::from_secs(93));
        assert_eq!(cues.cues()[1].clip, "Springtime_Mid_Voice");
    }

    #[test]
    fn offsets_use_clamped_durations() {
        let cues = schedule(&TimelineConfig::new(-10.0, 2.0, 0.0, 0.0));

        assert_eq!(
            cues.offset(Layer::Mid),
            Duration::from_secs(5) + Duration::from_secs_f64(0.001)
        );
        assert_eq!(
            cues.offset(Layer::Base),
            Duration::from_secs(7) + Duration::from_secs_f64(0.001) * 2
        );
    }

    #[test]
    fn huge_durations_give_capped_offsets() {
        let audio = AudioConfig {
            cue_lead_in: 1e20,
            ..AudioConfig::default()
        };
        let cues = CueSchedule::from_config(&TimelineConfig::new(1e20, 1.0, 1.0, 1.0), &audio);

        let cap = Duration::from_secs_f64(crate::config::MAX_SPAN_SECONDS);
        assert_eq!(cues.offset(Layer::Top), cap);
        assert_eq!(cues.offset(Layer::Mid), cap * 2 + Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn cues_fire_at_their_offsets() {
        let (timeline, backend, audio) = rig();
        let config = TimelineConfig::new(40.0, 40.0, 40.0, 4.0);
        let run = timeline.start(&config).unwrap();
        let _cues = CueSet::arm(&run, &schedule(&config), audio);

        sleep(Duration::from_millis(48_900)).await;
        assert_eq!(backend.started_once(), vec!["Springtime_Top_Voice"]);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(
            backend.started_once(),
            vec!["Springtime_Top_Voice", "Springtime_Mid_Voice"]
        );

        sleep(Duration::from_millis(44_000)).await;
        assert_eq!(backend.started_once().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_playing_and_pending_cues() {
        let (timeline, backend, audio) = rig();
        let config = TimelineConfig::new(40.0, 40.0, 40.0, 4.0);
        let run = timeline.start(&config).unwrap();
        let cues = CueSet::arm(&run, &schedule(&config), audio.clone());

        sleep(Duration::from_secs(6)).await;
        assert!(audio.is_playing("Springtime_Top_Voice"));
        assert!(cues.is_pending());

        timeline.cancel();
        cues.cancel();
        assert!(!audio.is_playing("Springtime_Top_Voice"));

        sleep(Duration::from_secs(200)).await;
        assert_eq!(backend.started_once(), vec!["Springtime_Top_Voice"]);
        assert_eq!(
            backend.events().last(),
            Some(&ClipEvent::Stopped {
                clip: "Springtime_Top_Voice".to_string()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn finished_run_releases_unfired_cues() {
        let (timeline, backend, audio) = rig();
        let config = TimelineConfig::new(6.0, 1.0, 1.0, 1.0);
        let run = timeline.start(&config).unwrap();
        let cues = CueSet::arm(&run, &schedule(&config), audio);

        sleep(Duration::from_secs(30)).await;

        // The run finishes at 10s: after top (5s), before mid (12s) and base (14s).
        assert_eq!(backend.started_once(), vec!["Springtime_Top_Voice"]);
        assert!(!cues.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_set_disarms_it() {
        let (timeline, backend, audio) = rig();
        let config = TimelineConfig::new(40.0, 40.0, 40.0, 4.0);
        let run = timeline.start(&config).unwrap();
        drop(CueSet::arm(&run, &schedule(&config), audio));

        sleep(Duration::from_secs(100)).await;
        assert!(backend.started_once().is_empty());
        assert!(run.is_live());
    }
}
