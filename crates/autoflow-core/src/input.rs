//! Input source and injector seams
//!
//! The OS hook that observes real input and the primitive that reproduces it
//! live behind these traits. The recorder only sees [`RawInput`] callbacks,
//! playback only talks to an [`InputInjector`].

use crate::error::Result;
use crate::events::{Event, EventData, Key, MouseButton};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The two independent capture streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStream {
    Pointer,
    Keyboard,
}

impl fmt::Display for CaptureStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureStream::Pointer => f.write_str("pointer"),
            CaptureStream::Keyboard => f.write_str("keyboard"),
        }
    }
}

/// Untimed input as delivered by a source
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    Move { x: i32, y: i32 },
    Click {
        x: i32,
        y: i32,
        button: MouseButton,
        pressed: bool,
    },
    Scroll { x: i32, y: i32, dx: i64, dy: i64 },
    KeyPress(Key),
    KeyRelease(Key),
}

impl RawInput {
    pub fn stream(&self) -> CaptureStream {
        match self {
            RawInput::KeyPress(_) | RawInput::KeyRelease(_) => CaptureStream::Keyboard,
            _ => CaptureStream::Pointer,
        }
    }

    pub fn key(&self) -> Option<&Key> {
        match self {
            RawInput::KeyPress(k) | RawInput::KeyRelease(k) => Some(k),
            _ => None,
        }
    }

    /// Stamp with seconds since the epoch
    pub fn at(self, t: f64) -> Event {
        let data = match self {
            RawInput::Move { x, y } => EventData::Move { x, y },
            RawInput::Click {
                x,
                y,
                button,
                pressed,
            } => EventData::Click {
                x,
                y,
                button,
                pressed,
            },
            RawInput::Scroll { x, y, dx, dy } => EventData::Scroll { x, y, dx, dy },
            RawInput::KeyPress(key) => EventData::KeyPress { key },
            RawInput::KeyRelease(key) => EventData::KeyRelease { key },
        };
        Event::new(t, data)
    }
}

/// Callback a source invokes for every observed input, from any thread
pub type InputCallback = Arc<dyn Fn(RawInput) + Send + Sync>;

/// Live subscription; capture ends when it is cancelled or dropped
pub struct Subscription {
    stream: CaptureStream,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(stream: CaptureStream, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            stream,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn stream(&self) -> CaptureStream {
        self.stream
    }

    pub fn cancel(mut self) {
        if let Some(f) = self.cancel.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.cancel.take() {
            f();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("stream", &self.stream)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Something that observes real pointer/keyboard input
pub trait InputSource: Send + Sync {
    /// Start delivering one stream to `callback`. Fails if the stream cannot
    /// be established (missing permission, no display, ...).
    fn subscribe(&self, stream: CaptureStream, callback: InputCallback) -> Result<Subscription>;
}

/// Something that reproduces pointer/keyboard actions on the host
pub trait InputInjector: Send + Sync {
    fn move_to(&self, x: i32, y: i32) -> Result<()>;

    fn button(&self, button: MouseButton, pressed: bool) -> Result<()>;

    fn scroll(&self, dx: i64, dy: i64) -> Result<()>;

    fn key(&self, key: &Key, pressed: bool) -> Result<()>;

    /// Reproduce one recorded event
    fn dispatch(&self, event: &Event) -> Result<()> {
        match &event.data {
            EventData::Move { x, y } => self.move_to(*x, *y),
            EventData::Click {
                button, pressed, ..
            } => self.button(*button, *pressed),
            EventData::Scroll { dx, dy, .. } => self.scroll(*dx, *dy),
            EventData::KeyPress { key } => self.key(key, true),
            EventData::KeyRelease { key } => self.key(key, false),
        }
    }
}

impl<T: InputSource + ?Sized> InputSource for Arc<T> {
    fn subscribe(&self, stream: CaptureStream, callback: InputCallback) -> Result<Subscription> {
        (**self).subscribe(stream, callback)
    }
}

impl<T: InputInjector + ?Sized> InputInjector for Arc<T> {
    fn move_to(&self, x: i32, y: i32) -> Result<()> {
        (**self).move_to(x, y)
    }

    fn button(&self, button: MouseButton, pressed: bool) -> Result<()> {
        (**self).button(button, pressed)
    }

    fn scroll(&self, dx: i64, dy: i64) -> Result<()> {
        (**self).scroll(dx, dy)
    }

    fn key(&self, key: &Key, pressed: bool) -> Result<()> {
        (**self).key(key, pressed)
    }

    fn dispatch(&self, event: &Event) -> Result<()> {
        (**self).dispatch(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn raw_input_routes_to_streams() {
        assert_eq!(RawInput::Move { x: 0, y: 0 }.stream(), CaptureStream::Pointer);
        assert_eq!(
            RawInput::KeyRelease(Key::named("Space")).stream(),
            CaptureStream::Keyboard
        );
    }

    #[test]
    fn stamping_keeps_payload() {
        let e = RawInput::Scroll {
            x: 3,
            y: 4,
            dx: 0,
            dy: -2,
        }
        .at(1.5);
        assert_eq!(e.t, 1.5);
        assert_eq!(
            e.data,
            EventData::Scroll {
                x: 3,
                y: 4,
                dx: 0,
                dy: -2
            }
        );
    }

    #[test]
    fn subscription_cancels_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let sub = Subscription::new(CaptureStream::Pointer, move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        sub.cancel();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let h = hits.clone();
        drop(Subscription::new(CaptureStream::Keyboard, move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
