//! Event recorder: timestamps raw input against a recording epoch
//!
//! Pointer and keyboard input arrive on two independent subscriptions. Both
//! feed one mutex-guarded buffer, so the stored order is arrival order.

use crate::notify::{Notification, Observer};
use autoflow_core::{
    CaptureStream, EventStore, InputCallback, InputSource, RawInput, Result, Subscription,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Recorder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Key names never captured
    pub ignored_keys: Vec<String>,
    /// Capture the keys bound as hotkeys as well
    pub record_hotkeys: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            ignored_keys: Vec::new(),
            record_hotkeys: false,
        }
    }
}

struct BufferState {
    open: bool,
    events: Vec<autoflow_core::Event>,
}

/// Buffer shared by the capture callbacks of one recording
struct CaptureBuffer {
    epoch: Instant,
    started_at: DateTime<Utc>,
    config: RecorderConfig,
    observer: Arc<dyn Observer>,
    state: Mutex<BufferState>,
}

impl CaptureBuffer {
    fn new(config: RecorderConfig, observer: Arc<dyn Observer>) -> Self {
        Self {
            epoch: Instant::now(),
            started_at: Utc::now(),
            config,
            observer,
            state: Mutex::new(BufferState {
                open: true,
                events: Vec::new(),
            }),
        }
    }

    fn ignores(&self, input: &RawInput) -> bool {
        match input.key() {
            Some(key) => self.config.ignored_keys.iter().any(|name| key.matches(name)),
            None => false,
        }
    }

    fn capture(&self, input: RawInput) {
        if self.ignores(&input) {
            return;
        }
        let t = self.epoch.elapsed().as_secs_f64();

        let echo = {
            let mut state = self.state.lock();
            if !state.open {
                return;
            }
            let event = input.at(t);
            let echo = event.is_echoed().then(|| event.label());
            state.events.push(event);
            echo
        };

        if let Some(label) = echo {
            self.observer
                .notify(Notification::EventCaptured { elapsed: t, label });
        }
    }

    fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    /// Close the buffer; later callbacks are dropped
    fn freeze(&self) -> EventStore {
        let mut state = self.state.lock();
        state.open = false;
        let events = std::mem::take(&mut state.events);
        EventStore::new(events, self.started_at, self.epoch.elapsed().as_secs_f64())
    }
}

/// Recording handle - owns the capture subscriptions of one session
pub struct RecordingHandle {
    buffer: Arc<CaptureBuffer>,
    subscriptions: Vec<Subscription>,
}

impl RecordingHandle {
    /// End both subscriptions and freeze what was captured
    pub fn stop(self) -> EventStore {
        for sub in self.subscriptions {
            sub.cancel();
        }
        let store = self.buffer.freeze();
        info!(events = store.len(), "recording stopped");
        store
    }

    /// Events captured so far
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.buffer.started_at
    }

    /// Seconds since the epoch
    pub fn elapsed(&self) -> f64 {
        self.buffer.epoch.elapsed().as_secs_f64()
    }
}

impl std::fmt::Debug for RecordingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingHandle")
            .field("events", &self.len())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

/// The recorder
pub struct EventRecorder {
    source: Arc<dyn InputSource>,
    config: RecorderConfig,
    observer: Arc<dyn Observer>,
}

impl EventRecorder {
    pub fn new(source: Arc<dyn InputSource>, observer: Arc<dyn Observer>) -> Self {
        Self::with_config(source, observer, RecorderConfig::default())
    }

    pub fn with_config(
        source: Arc<dyn InputSource>,
        observer: Arc<dyn Observer>,
        config: RecorderConfig,
    ) -> Self {
        Self {
            source,
            config,
            observer,
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Set the epoch and open both capture streams. If either stream
    /// cannot be opened, nothing stays subscribed.
    pub fn start(&self) -> Result<RecordingHandle> {
        let buffer = Arc::new(CaptureBuffer::new(
            self.config.clone(),
            Arc::clone(&self.observer),
        ));

        let mut subscriptions = Vec::with_capacity(2);
        for stream in [CaptureStream::Pointer, CaptureStream::Keyboard] {
            let sink = Arc::clone(&buffer);
            let callback: InputCallback = Arc::new(move |input| sink.capture(input));
            match self.source.subscribe(stream, callback) {
                Ok(sub) => {
                    debug!(%stream, "capture subscribed");
                    subscriptions.push(sub);
                }
                Err(e) => {
                    warn!(%stream, error = %e, "capture subscription failed");
                    for sub in subscriptions {
                        sub.cancel();
                    }
                    buffer.freeze();
                    return Err(e);
                }
            }
        }

        info!(started_at = %buffer.started_at, "recording started");
        Ok(RecordingHandle {
            buffer,
            subscriptions,
        })
    }
}
