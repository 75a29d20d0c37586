//! Application-level flow around one [`PhaseTimeline`]: starts and abandons
//! journeys, keeps the voice cues and ambient loop in step with the run, and
//! relays the finished signal as a move into reflection.

use std::sync::Arc;

use tokio::{
    sync::{broadcast::error::RecvError, watch},
    task::JoinHandle,
};

use crate::{
    config::clamped_seconds, AppConfig, AudioManager, Completion, CueSchedule, CueSet,
    JourneyError, PhaseTimeline, Result, RunHandle, RunId, Stage, TimelineEvent,
};

/// Coarse screen the experience is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperienceState {
    Home,
    Preparing,
    Journey,
    Reflection,
}

/// State plus the line of text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperienceStatus {
    pub state: ExperienceState,
    pub message: &'static str,
}

impl ExperienceStatus {
    fn new(state: ExperienceState, message: &'static str) -> Self {
        Self { state, message }
    }

    /// Idle status shown before a journey and after returning home.
    pub fn home() -> Self {
        Self::new(ExperienceState::Home, "Select your fragrance story.")
    }
}

type RampTask = JoinHandle<Result<Completion>>;

/// Owns the timeline, the voice cues of the current run and the status shown
/// to the user.
pub struct Experience<S> {
    config: AppConfig,
    timeline: PhaseTimeline<S>,
    audio: Arc<AudioManager>,
    status: watch::Sender<ExperienceStatus>,
    run: Option<RunHandle>,
    cues: Option<CueSet>,
    settle: Option<RampTask>,
}

impl<S: Stage> Experience<S> {
    /// Builds an experience at home. The stage is installed lazily by
    /// [`Experience::begin_journey`].
    pub fn new(config: AppConfig, stage: S, audio: Arc<AudioManager>) -> Self {
        let timeline = PhaseTimeline::new(stage, config.scene);
        let (status, _) = watch::channel(ExperienceStatus::home());
        Self {
            config,
            timeline,
            audio,
            status,
            run: None,
            cues: None,
            settle: None,
        }
    }

    /// Timeline driven by this experience.
    pub fn timeline(&self) -> &PhaseTimeline<S> {
        &self.timeline
    }

    /// Configuration captured at construction.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Latest status.
    pub fn status(&self) -> ExperienceStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<ExperienceStatus> {
        self.status.subscribe()
    }

    /// Run currently driven by the experience, if any.
    pub fn current_run(&self) -> Option<RunId> {
        self.run.as_ref().map(RunHandle::id)
    }

    /// Installs the stage if needed and starts a journey, replacing any journey
    /// already in progress.
    pub fn begin_journey(&mut self) -> Result<RunId> {
        self.set_status(ExperienceState::Preparing, "Preparing journey...");
        self.timeline.install();
        self.disarm_cues();
        self.stop_settle();

        self.set_status(ExperienceState::Journey, "Your scent journey is unfolding.");
        self.audio.play_loop(&self.config.audio.ambient_loop);

        let run = match self.timeline.start(&self.config.timeline) {
            Ok(run) => run,
            Err(err) => {
                self.audio.stop_loop();
                self.set_status_home();
                return Err(err);
            }
        };

        let schedule = CueSchedule::from_config(&self.config.timeline, &self.config.audio);
        self.cues = Some(CueSet::arm(&run, &schedule, Arc::clone(&self.audio)));
        let id = run.id();
        self.run = Some(run);
        Ok(id)
    }

    /// Reacts to a timeline event. Returns `true` when it finished the
    /// current journey; events of other runs are ignored.
    pub fn handle_event(&mut self, event: TimelineEvent) -> bool {
        match event {
            TimelineEvent::Finished { run } if Some(run) == self.current_run() => {
                self.on_journey_finished();
                true
            }
            TimelineEvent::PhaseEntered { run, phase } => {
                tracing::debug!(run = run.get(), phase = phase.name(), "journey progressed");
                false
            }
            TimelineEvent::Finished { .. } => false,
        }
    }

    fn on_journey_finished(&mut self) {
        self.run = None;
        self.disarm_cues();
        self.audio.stop_loop();
        self.set_status(ExperienceState::Reflection, "Take a moment to reflect.");

        let timeline = self.timeline.clone();
        let duration = clamped_seconds(self.config.reflection.settle_duration);
        self.settle = Some(tokio::spawn(async move {
            timeline.settle_into_reflection(duration).await
        }));
    }

    /// Waits for the settle ramp started when the journey finished.
    pub async fn settled(&mut self) -> Result<Completion> {
        match self.settle.take() {
            Some(task) => task
                .await
                .map_err(|err| JourneyError::msg(format!("settle ramp failed: {err}")))?,
            None => Ok(Completion::Finished),
        }
    }

    /// Fades the lighting out, silences everything and returns home.
    pub async fn complete_reflection(&mut self) -> Result<()> {
        self.status.send_modify(|status| status.message = "Returning home...");
        self.stop_settle();

        let fade = clamped_seconds(self.config.reflection.fade_duration);
        self.timeline.fade_out_and_reset(fade).await?;
        self.audio.stop_loop();
        self.reset_to_home();
        Ok(())
    }

    /// Drops the journey in progress, e.g. when the immersive space closes.
    pub fn abandon(&mut self) {
        self.timeline.cancel();
        self.stop_settle();
        self.audio.stop_loop();
        self.reset_to_home();
    }

    /// Tears down the run in flight, silences its voice cues and puts the
    /// timeline back at the baseline. The ambient loop is left alone.
    pub fn reset_to_home(&mut self) {
        self.run = None;
        self.disarm_cues();
        self.set_status_home();
        self.timeline.reset();
    }

    /// Runs one journey end to end: begin, wait for the finished signal, settle
    /// into reflection and return home.
    pub async fn play_through(&mut self) -> Result<()> {
        let mut events = self.timeline.subscribe();
        self.begin_journey()?;

        loop {
            match events.recv().await {
                Ok(event) => {
                    if self.handle_event(event) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "timeline events lagged");
                }
                Err(RecvError::Closed) => {
                    return Err(JourneyError::msg("timeline event channel closed"));
                }
            }
        }

        self.settled().await?;
        self.complete_reflection().await
    }

    fn disarm_cues(&mut self) {
        if let Some(cues) = self.cues.take() {
            cues.cancel();
        }
    }

    fn stop_settle(&mut self) {
        if self.settle.take().is_some() {
            self.timeline.cancel_ramp();
        }
    }

    fn set_status(&self, state: ExperienceState, message: &'static str) {
        tracing::info!(?state, status = message, "experience status");
        self.status.send_replace(ExperienceStatus::new(state, message));
    }

    fn set_status_home(&self) {
        let home = ExperienceStatus::home();
        self.set_status(home.state, home.message);
    }
}

impl<S> std::fmt::Debug for Experience<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Experience")
            .field("status", &*self.status.borrow())
            .finish()
    }
}
