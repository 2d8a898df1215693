//! In-process input backends
//!
//! `ManualSource` lets code feed input as if it came from the OS,
//! `MemoryInjector` keeps every reproduced action instead of touching the
//! host. Used by tests and by embedders that drive autoflow from their own
//! event loop.

use autoflow_core::{
    CaptureStream, Error, Event, InputCallback, InputInjector, InputSource, Key, MouseButton,
    RawInput, Result, Subscription,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Default)]
struct Subscribers {
    next_id: AtomicU64,
    list: Mutex<Vec<(u64, CaptureStream, InputCallback)>>,
}

/// Source driven by [`ManualSource::emit`]
#[derive(Clone, Default)]
pub struct ManualSource {
    subscribers: Arc<Subscribers>,
    /// Streams that refuse to subscribe
    failing: Arc<Mutex<Vec<CaptureStream>>>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subscriptions to `stream` fail, as if permission was denied
    pub fn fail_stream(&self, stream: CaptureStream) {
        self.failing.lock().push(stream);
    }

    /// Deliver one input on the calling thread to every matching subscriber
    pub fn emit(&self, input: RawInput) {
        let stream = input.stream();
        let targets: Vec<InputCallback> = self
            .subscribers
            .list
            .lock()
            .iter()
            .filter(|(_, s, _)| *s == stream)
            .map(|(_, _, cb)| Arc::clone(cb))
            .collect();
        for cb in targets {
            cb(input.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.list.lock().len()
    }
}

impl InputSource for ManualSource {
    fn subscribe(&self, stream: CaptureStream, callback: InputCallback) -> Result<Subscription> {
        if self.failing.lock().contains(&stream) {
            return Err(Error::permission_denied(format!(
                "{} capture refused",
                stream
            )));
        }

        let id = self.subscribers.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.list.lock().push((id, stream, callback));

        let subscribers = Arc::clone(&self.subscribers);
        Ok(Subscription::new(stream, move || {
            subscribers.list.lock().retain(|(i, _, _)| *i != id);
        }))
    }
}

/// One reproduced action
#[derive(Debug, Clone)]
pub struct Action {
    pub at: Instant,
    pub label: String,
    pub event: Option<Event>,
}

/// Injector that records instead of reproducing
#[derive(Debug, Default)]
pub struct MemoryInjector {
    actions: Mutex<Vec<Action>>,
}

impl MemoryInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.actions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.lock().is_empty()
    }

    pub fn clear(&self) {
        self.actions.lock().clear();
    }

    fn push(&self, label: String, event: Option<Event>) {
        self.actions.lock().push(Action {
            at: Instant::now(),
            label,
            event,
        });
    }
}

impl InputInjector for MemoryInjector {
    fn move_to(&self, x: i32, y: i32) -> Result<()> {
        self.push(format!("Move {},{}", x, y), None);
        Ok(())
    }

    fn button(&self, button: MouseButton, pressed: bool) -> Result<()> {
        let verb = if pressed { "Press" } else { "Release" };
        self.push(format!("{} {}", verb, button), None);
        Ok(())
    }

    fn scroll(&self, dx: i64, dy: i64) -> Result<()> {
        self.push(format!("Scroll {},{}", dx, dy), None);
        Ok(())
    }

    fn key(&self, key: &Key, pressed: bool) -> Result<()> {
        let verb = if pressed { "Press" } else { "Release" };
        self.push(format!("{} {}", verb, key), None);
        Ok(())
    }

    fn dispatch(&self, event: &Event) -> Result<()> {
        self.push(event.label(), Some(event.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn emits_only_to_matching_stream() {
        let source = ManualSource::new();
        let pointer = Arc::new(AtomicUsize::new(0));
        let p = Arc::clone(&pointer);
        let _sub = source
            .subscribe(
                CaptureStream::Pointer,
                Arc::new(move |_| {
                    p.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        source.emit(RawInput::Move { x: 1, y: 2 });
        source.emit(RawInput::KeyPress(Key::named("KeyA")));
        assert_eq!(pointer.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let source = ManualSource::new();
        let sub = source
            .subscribe(CaptureStream::Keyboard, Arc::new(|_| {}))
            .unwrap();
        assert_eq!(source.subscriber_count(), 1);
        drop(sub);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn failing_stream_refuses() {
        let source = ManualSource::new();
        source.fail_stream(CaptureStream::Keyboard);
        let err = source
            .subscribe(CaptureStream::Keyboard, Arc::new(|_| {}))
            .unwrap_err();
        assert!(err.is_capture_failure());
        assert!(source
            .subscribe(CaptureStream::Pointer, Arc::new(|_| {}))
            .is_ok());
    }

    #[test]
    fn injector_keeps_event_labels() {
        let injector = MemoryInjector::new();
        injector
            .dispatch(&Event::new(
                0.0,
                autoflow_core::EventData::KeyRelease {
                    key: Key::named("Space"),
                },
            ))
            .unwrap();
        injector.scroll(0, -3).unwrap();
        let labels: Vec<String> = injector.actions().into_iter().map(|a| a.label).collect();
        assert_eq!(labels, vec!["Release Space", "Scroll 0,-3"]);
    }
}
