//! Timed playback of a frozen event store
//!
//! Each repetition re-anchors on the monotonic clock and schedules event `i`
//! at `anchor + t_i / speed`. Waiting is done on a condvar so a stop request
//! wakes the worker immediately instead of after the remaining gap.

use crate::notify::{Notification, Observer};
use autoflow_core::{Event, EventKind, EventStore, InputInjector};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 2.0;

/// Clamp a requested speed into the supported range
pub fn clamp_speed(speed: f64) -> f64 {
    if speed.is_finite() {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    } else {
        1.0
    }
}

/// Speed and loop policy, snapshotted when playback starts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackParameters {
    /// 1.0 = real time, 2.0 = twice as fast
    pub speed: f64,
    pub loop_enabled: bool,
    /// Repetitions when looping, 0 = until stopped
    pub loop_count: u32,
}

impl PlaybackParameters {
    pub fn new(speed: f64, loop_enabled: bool, loop_count: u32) -> Self {
        Self {
            speed: clamp_speed(speed),
            loop_enabled,
            loop_count,
        }
    }

    pub fn once(speed: f64) -> Self {
        Self::new(speed, false, 1)
    }

    /// Same parameters with the speed forced into range
    pub fn clamped(self) -> Self {
        Self {
            speed: clamp_speed(self.speed),
            ..self
        }
    }

    /// Number of passes to make, `None` when unbounded
    pub fn repetitions(&self) -> Option<u32> {
        match (self.loop_enabled, self.loop_count) {
            (false, _) => Some(1),
            (true, 0) => None,
            (true, n) => Some(n),
        }
    }
}

impl Default for PlaybackParameters {
    fn default() -> Self {
        Self {
            speed: 1.0,
            loop_enabled: false,
            loop_count: 1,
        }
    }
}

/// Stop request shared between the controller and the worker
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: Mutex<bool>,
    cv: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let mut flag = self.cancelled.lock();
        if !*flag {
            *flag = true;
            self.cv.notify_all();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock()
    }

    /// Block until `deadline` or a cancel, whichever comes first.
    /// Returns true if cancelled.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut flag = self.cancelled.lock();
        while !*flag {
            if Instant::now() >= deadline {
                break;
            }
            self.cv.wait_until(&mut flag, deadline);
        }
        *flag
    }
}

/// What a playback session did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaybackReport {
    /// Completed passes over the store
    pub repetitions: u32,
    pub moves: usize,
    pub clicks: usize,
    pub scrolls: usize,
    pub keys: usize,
    pub failures: usize,
    pub cancelled: bool,
    /// Wall time spent, seconds
    pub elapsed: f64,
}

impl PlaybackReport {
    /// Successful dispatches
    pub fn dispatched(&self) -> usize {
        self.moves + self.clicks + self.scrolls + self.keys
    }

    fn record(&mut self, event: &Event) {
        match event.kind() {
            EventKind::Move => self.moves += 1,
            EventKind::Click => self.clicks += 1,
            EventKind::Scroll => self.scrolls += 1,
            EventKind::Key => self.keys += 1,
        }
    }
}

/// Drives an injector through a recording
pub struct PlaybackScheduler {
    injector: Arc<dyn InputInjector>,
    observer: Arc<dyn Observer>,
}

impl PlaybackScheduler {
    pub fn new(injector: Arc<dyn InputInjector>, observer: Arc<dyn Observer>) -> Self {
        Self { injector, observer }
    }

    /// Run on the calling thread until the repetitions are exhausted or
    /// `cancel` fires.
    pub fn run(
        &self,
        store: &EventStore,
        params: PlaybackParameters,
        cancel: &CancelToken,
    ) -> PlaybackReport {
        let params = params.clamped();
        let started = Instant::now();
        let mut report = PlaybackReport::default();

        loop {
            if !self.run_pass(store, params.speed, cancel, &mut report) {
                break;
            }
            report.repetitions += 1;
            debug!(repetition = report.repetitions, "pass complete");

            if cancel.is_cancelled() || store.is_empty() {
                break;
            }
            match params.repetitions() {
                Some(n) if report.repetitions >= n => break,
                _ => {}
            }
        }

        report.cancelled = cancel.is_cancelled();
        report.elapsed = started.elapsed().as_secs_f64();
        report
    }

    /// One pass with a fresh anchor. Returns false if cancelled midway.
    fn run_pass(
        &self,
        store: &EventStore,
        speed: f64,
        cancel: &CancelToken,
        report: &mut PlaybackReport,
    ) -> bool {
        let anchor = Instant::now();

        for (index, event) in store.iter().enumerate() {
            if cancel.is_cancelled() {
                return false;
            }

            let target = anchor + event.offset().div_f64(speed);
            if cancel.wait_until(target) {
                return false;
            }

            trace!(index, t = event.t, "dispatch");
            match self.injector.dispatch(event) {
                Ok(()) => report.record(event),
                Err(e) => {
                    warn!(index, error = %e, "event not reproduced");
                    report.failures += 1;
                    self.observer.notify(Notification::InjectionFailed {
                        index,
                        message: e.message.clone(),
                    });
                }
            }
        }
        true
    }

    /// Run on a dedicated thread. `PlaybackStarted` is emitted from the
    /// worker before the first wait; `on_exit` receives the report after the
    /// last dispatch, on the worker thread.
    pub fn spawn<F>(
        self: &Arc<Self>,
        store: EventStore,
        params: PlaybackParameters,
        on_exit: F,
    ) -> std::io::Result<PlaybackHandle>
    where
        F: FnOnce(PlaybackReport) + Send + 'static,
    {
        let cancel = Arc::new(CancelToken::new());
        let scheduler = Arc::clone(self);
        let token = Arc::clone(&cancel);
        let params = params.clamped();

        let thread = thread::Builder::new()
            .name("autoflow-playback".to_string())
            .spawn(move || {
                info!(events = store.len(), speed = params.speed, "playback started");
                scheduler.observer.notify(Notification::PlaybackStarted {
                    events: store.len(),
                    speed: params.speed,
                    loop_enabled: params.loop_enabled,
                    loop_count: params.loop_count,
                });
                let report = scheduler.run(&store, params, &token);
                info!(
                    repetitions = report.repetitions,
                    dispatched = report.dispatched(),
                    failures = report.failures,
                    cancelled = report.cancelled,
                    "playback ended"
                );
                on_exit(report);
            })?;

        Ok(PlaybackHandle {
            cancel,
            thread: Some(thread),
        })
    }
}

/// Running playback worker
#[derive(Debug)]
pub struct PlaybackHandle {
    cancel: Arc<CancelToken>,
    thread: Option<thread::JoinHandle<()>>,
}

impl PlaybackHandle {
    /// Request a stop; returns immediately
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Wait for the worker to exit
    pub fn join(mut self) {
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

/// Due time of event `event` in a pass anchored at `anchor`
pub fn due_at(anchor: Instant, event: &Event, speed: f64) -> Instant {
    anchor + event.offset().div_f64(clamp_speed(speed))
}

/// Scaled length of a recording, for status output
pub fn scaled_duration(store: &EventStore, speed: f64) -> Duration {
    let last = store
        .iter()
        .map(|e| e.offset())
        .max()
        .unwrap_or(Duration::ZERO);
    last.div_f64(clamp_speed(speed))
}
