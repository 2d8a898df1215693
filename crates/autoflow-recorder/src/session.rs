//! Session controller: the Idle / Recording / Playing state machine
//!
//! Every entry point checks the state and transitions under one mutex.
//! Requests that do not fit the current state are ignored and logged at
//! debug level. Observers are always called after the lock is released.

use crate::config::Config;
use crate::notify::{Notification, Observer};
use crate::recorder::{EventRecorder, RecordingHandle};
use crate::replay::{
    clamp_speed, PlaybackHandle, PlaybackParameters, PlaybackReport, PlaybackScheduler,
};
use autoflow_core::{Command, EventStore, InputInjector, InputSource, Result};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Recording,
    Playing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Recording => write!(f, "recording"),
            SessionState::Playing => write!(f, "playing"),
        }
    }
}

struct Inner {
    state: SessionState,
    recording: Option<RecordingHandle>,
    playback: Option<PlaybackHandle>,
    store: EventStore,
    /// Live parameters, snapshotted by each playback start
    params: PlaybackParameters,
}

struct Shared {
    inner: Mutex<Inner>,
    idle: Condvar,
}

/// Recorder and player behind one state machine
pub struct Session {
    shared: Arc<Shared>,
    recorder: EventRecorder,
    scheduler: Arc<PlaybackScheduler>,
    observer: Arc<dyn Observer>,
    speed_step: f64,
}

impl Session {
    pub fn new(
        config: &Config,
        source: Arc<dyn InputSource>,
        injector: Arc<dyn InputInjector>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        let recorder = EventRecorder::with_config(
            source,
            Arc::clone(&observer),
            config.effective_recorder(),
        );
        let scheduler = Arc::new(PlaybackScheduler::new(injector, Arc::clone(&observer)));

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: SessionState::Idle,
                    recording: None,
                    playback: None,
                    store: EventStore::empty(),
                    params: config.playback.clamped(),
                }),
                idle: Condvar::new(),
            }),
            recorder,
            scheduler,
            observer,
            speed_step: config.speed_step,
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().state
    }

    /// The last frozen recording
    pub fn events(&self) -> EventStore {
        self.shared.inner.lock().store.clone()
    }

    /// Live playback parameters
    pub fn parameters(&self) -> PlaybackParameters {
        self.shared.inner.lock().params
    }

    /// Begin capturing. Ok(false) when the session is not idle.
    pub fn start_recording(&self) -> Result<bool> {
        {
            let mut inner = self.shared.inner.lock();
            if inner.state != SessionState::Idle {
                debug!(state = %inner.state, "start recording ignored");
                return Ok(false);
            }
            // On failure the recorder has already unwound its subscriptions
            let handle = self.recorder.start()?;
            inner.store = EventStore::empty();
            inner.recording = Some(handle);
            inner.state = SessionState::Recording;
        }
        self.observer.notify(Notification::RecordingStarted);
        Ok(true)
    }

    /// Stop capturing and freeze the recording. None when not recording.
    pub fn stop_recording(&self) -> Option<EventStore> {
        let store = {
            let mut inner = self.shared.inner.lock();
            if inner.state != SessionState::Recording {
                debug!(state = %inner.state, "stop recording ignored");
                return None;
            }
            let store = match inner.recording.take() {
                Some(handle) => handle.stop(),
                None => EventStore::empty(),
            };
            inner.store = store.clone();
            inner.state = SessionState::Idle;
            self.shared.idle.notify_all();
            store
        };
        self.observer
            .notify(Notification::RecordingStopped { count: store.len() });
        Some(store)
    }

    /// Play the last recording with `params`. False when not idle, when
    /// nothing was recorded, or when the worker could not be started.
    pub fn start_playback(&self, params: PlaybackParameters) -> bool {
        let mut inner = self.shared.inner.lock();
        if inner.state != SessionState::Idle {
            debug!(state = %inner.state, "start playback ignored");
            return false;
        }
        if inner.store.is_empty() {
            debug!("start playback ignored, nothing recorded");
            return false;
        }

        let shared = Arc::clone(&self.shared);
        let observer = Arc::clone(&self.observer);
        // The end notification goes out while the state is still Playing, so
        // no later playback can report its start ahead of it.
        let on_exit = move |report: PlaybackReport| {
            if report.cancelled {
                observer.notify(Notification::PlaybackCancelled { report });
            } else {
                observer.notify(Notification::PlaybackFinished { report });
            }
            let mut inner = shared.inner.lock();
            inner.playback = None;
            inner.state = SessionState::Idle;
            shared.idle.notify_all();
        };

        // The worker's exit hook blocks on this lock until the handle is stored
        match self
            .scheduler
            .spawn(inner.store.clone(), params.clamped(), on_exit)
        {
            Ok(handle) => {
                inner.playback = Some(handle);
                inner.state = SessionState::Playing;
                true
            }
            Err(e) => {
                warn!(error = %e, "could not start playback worker");
                false
            }
        }
    }

    /// Play with the live parameters
    pub fn play(&self) -> bool {
        let params = self.parameters();
        self.start_playback(params)
    }

    /// Request cancellation; returns without waiting for the worker
    pub fn stop_playback(&self) {
        let inner = self.shared.inner.lock();
        match inner.playback.as_ref() {
            Some(handle) => {
                if !handle.is_cancelled() {
                    info!("playback cancel requested");
                }
                handle.cancel();
            }
            None => debug!(state = %inner.state, "stop playback ignored"),
        }
    }

    /// Set the live speed; returns the clamped value
    pub fn set_speed(&self, speed: f64) -> f64 {
        let speed = {
            let mut inner = self.shared.inner.lock();
            inner.params.speed = clamp_speed(speed);
            inner.params.speed
        };
        self.observer.notify(Notification::SpeedChanged { speed });
        speed
    }

    pub fn speed_up(&self) -> f64 {
        self.step_speed(self.speed_step)
    }

    pub fn speed_down(&self) -> f64 {
        self.step_speed(-self.speed_step)
    }

    fn step_speed(&self, delta: f64) -> f64 {
        let speed = {
            let mut inner = self.shared.inner.lock();
            // keep repeated 0.1 steps from drifting to 1.2000000000000002
            let next = ((inner.params.speed + delta) * 1000.0).round() / 1000.0;
            inner.params.speed = clamp_speed(next);
            inner.params.speed
        };
        self.observer.notify(Notification::SpeedChanged { speed });
        speed
    }

    pub fn set_loop(&self, enabled: bool, count: u32) {
        let mut inner = self.shared.inner.lock();
        inner.params.loop_enabled = enabled;
        inner.params.loop_count = count;
        info!(enabled, count, "loop policy updated");
    }

    /// Stop if recording, otherwise start
    pub fn toggle_recording(&self) -> Result<()> {
        if self.state() == SessionState::Recording {
            self.stop_recording();
        } else {
            self.start_recording()?;
        }
        Ok(())
    }

    /// Stop whatever is running
    pub fn stop_all(&self) {
        self.stop_recording();
        self.stop_playback();
        self.observer.notify(Notification::Stopped);
    }

    pub fn apply(&self, command: Command) -> Result<()> {
        debug!(?command, "apply");
        match command {
            Command::ToggleRecording => self.toggle_recording()?,
            Command::StartRecording => {
                self.start_recording()?;
            }
            Command::StopRecording => {
                self.stop_recording();
            }
            Command::StartPlayback => {
                self.play();
            }
            Command::StopPlayback => self.stop_playback(),
            Command::StopAll => self.stop_all(),
            Command::SpeedUp => {
                self.speed_up();
            }
            Command::SpeedDown => {
                self.speed_down();
            }
            Command::SetSpeed { speed } => {
                self.set_speed(speed);
            }
            Command::SetLoop { enabled, count } => self.set_loop(enabled, count),
        }
        Ok(())
    }

    /// Block until the session is idle. False on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.inner.lock();
        while inner.state != SessionState::Idle {
            if self.shared.idle.wait_until(&mut inner, deadline).timed_out() {
                return inner.state == SessionState::Idle;
            }
        }
        true
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let inner = self.shared.inner.lock();
        if let Some(handle) = inner.playback.as_ref() {
            handle.cancel();
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("Session")
            .field("state", &inner.state)
            .field("events", &inner.store.len())
            .field("params", &inner.params)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoopObserver;
    use crate::platform::memory::{ManualSource, MemoryInjector};
    use autoflow_core::{Key, RawInput};

    fn session(source: &ManualSource) -> Session {
        Session::new(
            &Config::default(),
            Arc::new(source.clone()),
            Arc::new(MemoryInjector::new()),
            Arc::new(NoopObserver),
        )
    }

    #[test]
    fn state_machine_transitions() {
        let source = ManualSource::new();
        let s = session(&source);
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.stop_recording().is_none());

        assert!(s.start_recording().unwrap());
        assert_eq!(s.state(), SessionState::Recording);
        assert!(!s.start_recording().unwrap());
        assert!(!s.play());

        source.emit(RawInput::KeyPress(Key::named("KeyA")));
        let store = s.stop_recording().unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(s.events().len(), 1);
    }

    #[test]
    fn empty_recording_does_not_play() {
        let source = ManualSource::new();
        let s = session(&source);
        s.start_recording().unwrap();
        assert_eq!(s.stop_recording().unwrap().len(), 0);
        assert!(!s.play());
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn speed_steps_are_clamped_and_clean() {
        let s = session(&ManualSource::new());
        assert_eq!(s.speed_up(), 1.1);
        assert_eq!(s.speed_up(), 1.2);
        assert_eq!(s.set_speed(9.0), 2.0);
        assert_eq!(s.speed_up(), 2.0);
        assert_eq!(s.set_speed(0.55), 0.55);
        assert_eq!(s.speed_down(), 0.5);
        assert_eq!(s.speed_down(), 0.5);
        assert_eq!(s.set_speed(f64::NAN), 1.0);
    }

    #[test]
    fn loop_policy_is_stored() {
        let s = session(&ManualSource::new());
        s.apply(Command::SetLoop {
            enabled: true,
            count: 4,
        })
        .unwrap();
        let p = s.parameters();
        assert!(p.loop_enabled);
        assert_eq!(p.loop_count, 4);
    }

    #[test]
    fn toggle_flips_recording() {
        let s = session(&ManualSource::new());
        s.toggle_recording().unwrap();
        assert_eq!(s.state(), SessionState::Recording);
        s.toggle_recording().unwrap();
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn concurrent_speed_steps_are_not_lost() {
        let s = Arc::new(session(&ManualSource::new()));
        s.set_speed(0.5);
        let workers: Vec<_> = (0..2)
            .map(|_| {
                let s = Arc::clone(&s);
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        s.speed_up();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(s.parameters().speed, 1.5);
    }

    #[test]
    fn wait_idle_returns_at_once_when_idle() {
        let s = session(&ManualSource::new());
        assert!(s.wait_idle(Duration::ZERO));
        s.start_recording().unwrap();
        assert!(!s.wait_idle(Duration::from_millis(10)));
    }
}
