use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::Result;

/// Playback primitive provided by the host platform.
pub trait ClipBackend: Send + Sync + 'static {
    /// Starts the named clip, optionally looping forever.
    fn start(&self, clip: &str, looping: bool) -> Result<()>;

    /// Stops `clip`. Stopping a clip that is not playing is a no-op.
    fn stop(&self, clip: &str);
}

#[derive(Debug, Default)]
struct AudioState {
    ambient: Option<String>,
    voiceovers: HashSet<String>,
}

/// High level audio façade used by the journey: one ambient loop plus any
/// number of named one-shot voiceovers.
pub struct AudioManager {
    backend: Arc<dyn ClipBackend>,
    state: Mutex<AudioState>,
}

impl AudioManager {
    /// Creates a manager with nothing playing.
    pub fn new(backend: Arc<dyn ClipBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(AudioState::default()),
        }
    }

    /// Starts `clip` as the ambient loop, replacing the current one.
    pub fn play_loop(&self, clip: &str) {
        let mut state = self.lock();
        if let Some(previous) = state.ambient.take() {
            self.backend.stop(&previous);
        }

        match self.backend.start(clip, true) {
            Ok(()) => state.ambient = Some(clip.to_string()),
            Err(err) => tracing::warn!(clip, %err, "failed to start ambient loop"),
        }
    }

    /// Stops the ambient loop, if any.
    pub fn stop_loop(&self) {
        if let Some(ambient) = self.lock().ambient.take() {
            self.backend.stop(&ambient);
        }
    }

    /// Plays `clip` once. Returns `false` without restarting anything when a
    /// voiceover with that name is already playing, or when the backend could
    /// not start it.
    pub fn play_once(&self, clip: &str) -> bool {
        self.play_once_if(clip, || true)
    }

    /// Like [`play_once`](Self::play_once), but `still_wanted` is evaluated
    /// under the audio lock right before starting. A caller that flips the
    /// condition and then calls [`stop_all`](Self::stop_all) is guaranteed
    /// that the clip is either never started or stopped again.
    pub fn play_once_if<F>(&self, clip: &str, still_wanted: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        let mut state = self.lock();
        if state.voiceovers.contains(clip) || !still_wanted() {
            return false;
        }

        match self.backend.start(clip, false) {
            Ok(()) => {
                state.voiceovers.insert(clip.to_string());
                true
            }
            Err(err) => {
                tracing::warn!(clip, %err, "failed to start voiceover");
                false
            }
        }
    }

    /// Stops every voiceover. The ambient loop keeps playing.
    pub fn stop_all(&self) {
        let mut state = self.lock();
        for clip in state.voiceovers.drain() {
            self.backend.stop(&clip);
        }
    }

    /// Whether `clip` is the ambient loop or a voiceover still playing.
    pub fn is_playing(&self, clip: &str) -> bool {
        let state = self.lock();
        state.voiceovers.contains(clip) || state.ambient.as_deref() == Some(clip)
    }

    /// Clip currently looping in the background.
    pub fn ambient(&self) -> Option<String> {
        self.lock().ambient.clone()
    }

    fn lock(&self) -> MutexGuard<'_, AudioState> {
        // Every update leaves the bookkeeping consistent, so a poisoned lock
        // is still safe to reuse.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AudioManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioManager").finish()
    }
}

/// Backend that only logs what would be played.
#[derive(Debug, Default)]
pub struct TracingBackend;

impl ClipBackend for TracingBackend {
    fn start(&self, clip: &str, looping: bool) -> Result<()> {
        tracing::info!(clip, looping, "audio clip started");
        Ok(())
    }

    fn stop(&self, clip: &str) {
        tracing::info!(clip, "audio clip stopped");
    }
}

/// Event observed by a [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipEvent {
    Started { clip: String, looping: bool },
    Stopped { clip: String },
}

/// Backend that records every call in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    events: Mutex<Vec<ClipEvent>>,
    unavailable: HashSet<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that fails to start any of `clips`.
    pub fn missing(clips: &[&str]) -> Self {
        Self {
            events: Mutex::default(),
            unavailable: clips.iter().map(|clip| clip.to_string()).collect(),
        }
    }

    /// Every start and stop seen so far, oldest first.
    pub fn events(&self) -> Vec<ClipEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of one-shot clips started so far, in order.
    pub fn started_once(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ClipEvent::Started {
                    clip,
                    looping: false,
                } => Some(clip),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: ClipEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl ClipBackend for MemoryBackend {
    fn start(&self, clip: &str, looping: bool) -> Result<()> {
        if self.unavailable.contains(clip) {
            return Err(format!("audio resource not found: {clip}").into());
        }
        self.record(ClipEvent::Started {
            clip: clip.to_string(),
            looping,
        });
        Ok(())
    }

    fn stop(&self, clip: &str) {
        self.record(ClipEvent::Stopped {
            clip: clip.to_string(),
        });
    }
}
