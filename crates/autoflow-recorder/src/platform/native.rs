//! OS input capture and injection through rdev
//!
//! rdev allows one blocking listener per process and it cannot be stopped,
//! so a single hub thread is started on first use and fans events out to the
//! current subscribers. Cancelling a subscription only unregisters it.

use autoflow_core::{
    CaptureStream, Error, InputCallback, InputInjector, InputSource, Key, MouseButton, RawInput,
    Result, Subscription,
};
use crossbeam_channel::{bounded, RecvTimeoutError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a listener gets to report a start-up failure
const LISTEN_GRACE: Duration = Duration::from_millis(250);

static HUB: Mutex<Option<Arc<Hub>>> = parking_lot::const_mutex(None);

#[derive(Default)]
struct Hub {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, CaptureStream, InputCallback)>>,
}

impl Hub {
    fn get() -> Result<Arc<Hub>> {
        let mut slot = HUB.lock();
        if let Some(hub) = slot.as_ref() {
            return Ok(Arc::clone(hub));
        }

        let hub = Arc::new(Hub::default());
        let (tx, rx) = bounded::<String>(1);
        let listener = Arc::clone(&hub);

        thread::Builder::new()
            .name("autoflow-listen".to_string())
            .spawn(move || {
                let mut pos = (0i32, 0i32);
                let result = rdev::listen(move |event| {
                    listener.deliver(translate(&event.event_type, &mut pos));
                });
                if let Err(e) = result {
                    let _ = tx.send(format!("{:?}", e));
                }
            })?;

        match rx.recv_timeout(LISTEN_GRACE) {
            Ok(reason) => Err(Error::permission_denied(format!(
                "input listener failed: {}",
                reason
            ))),
            Err(RecvTimeoutError::Timeout) => {
                info!("input listener running");
                *slot = Some(Arc::clone(&hub));
                Ok(hub)
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::capture_unavailable(
                "native",
                "listener exited without an error",
            )),
        }
    }

    fn deliver(&self, input: RawInput) {
        let stream = input.stream();
        let targets: Vec<InputCallback> = self
            .subscribers
            .lock()
            .iter()
            .filter(|(_, s, _)| *s == stream)
            .map(|(_, _, cb)| Arc::clone(cb))
            .collect();
        for cb in targets {
            cb(input.clone());
        }
    }

    fn subscribe(self: &Arc<Self>, stream: CaptureStream, callback: InputCallback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push((id, stream, callback));
        debug!(id, %stream, "subscribed");

        let hub = Arc::clone(self);
        Subscription::new(stream, move || {
            hub.subscribers.lock().retain(|(i, _, _)| *i != id);
            debug!(id, "unsubscribed");
        })
    }
}

fn translate(event: &rdev::EventType, pos: &mut (i32, i32)) -> RawInput {
    use rdev::EventType as E;

    match event {
        E::MouseMove { x, y } => {
            *pos = (x.round() as i32, y.round() as i32);
            RawInput::Move { x: pos.0, y: pos.1 }
        }
        E::ButtonPress(b) => RawInput::Click {
            x: pos.0,
            y: pos.1,
            button: button_from(*b),
            pressed: true,
        },
        E::ButtonRelease(b) => RawInput::Click {
            x: pos.0,
            y: pos.1,
            button: button_from(*b),
            pressed: false,
        },
        E::Wheel { delta_x, delta_y } => RawInput::Scroll {
            x: pos.0,
            y: pos.1,
            dx: *delta_x,
            dy: *delta_y,
        },
        E::KeyPress(k) => RawInput::KeyPress(key_from(*k)),
        E::KeyRelease(k) => RawInput::KeyRelease(key_from(*k)),
    }
}

fn button_from(b: rdev::Button) -> MouseButton {
    match b {
        rdev::Button::Left => MouseButton::Left,
        rdev::Button::Right => MouseButton::Right,
        rdev::Button::Middle => MouseButton::Middle,
        rdev::Button::Unknown(n) => MouseButton::Other(n),
    }
}

fn button_to(b: MouseButton) -> rdev::Button {
    match b {
        MouseButton::Left => rdev::Button::Left,
        MouseButton::Right => rdev::Button::Right,
        MouseButton::Middle => rdev::Button::Middle,
        MouseButton::Other(n) => rdev::Button::Unknown(n),
    }
}

/// rdev serializes unit key variants as their names
fn key_from(k: rdev::Key) -> Key {
    match k {
        rdev::Key::Unknown(code) => Key::Code(code),
        other => match serde_json::to_value(other) {
            Ok(serde_json::Value::String(name)) => Key::Named(name),
            _ => Key::Named(format!("{:?}", other)),
        },
    }
}

fn key_to(k: &Key) -> Result<rdev::Key> {
    match k {
        Key::Code(code) => Ok(rdev::Key::Unknown(*code)),
        Key::Named(name) => serde_json::from_value(serde_json::Value::String(name.clone()))
            .map_err(|_| Error::unsupported_key(name)),
    }
}

/// Source backed by the process-wide rdev listener
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeSource;

impl InputSource for NativeSource {
    fn subscribe(&self, stream: CaptureStream, callback: InputCallback) -> Result<Subscription> {
        let hub = Hub::get()?;
        Ok(hub.subscribe(stream, callback))
    }
}

/// Injector backed by `rdev::simulate`
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeInjector;

impl NativeInjector {
    fn send(&self, what: &str, event: rdev::EventType) -> Result<()> {
        rdev::simulate(&event).map_err(|e| {
            warn!(action = what, "simulate rejected");
            Error::injection_failed(what, &format!("{:?}", e))
        })
    }
}

impl InputInjector for NativeInjector {
    fn move_to(&self, x: i32, y: i32) -> Result<()> {
        self.send(
            "move",
            rdev::EventType::MouseMove {
                x: x as f64,
                y: y as f64,
            },
        )
    }

    fn button(&self, button: MouseButton, pressed: bool) -> Result<()> {
        let b = button_to(button);
        if pressed {
            self.send("button press", rdev::EventType::ButtonPress(b))
        } else {
            self.send("button release", rdev::EventType::ButtonRelease(b))
        }
    }

    fn scroll(&self, dx: i64, dy: i64) -> Result<()> {
        self.send(
            "scroll",
            rdev::EventType::Wheel {
                delta_x: dx,
                delta_y: dy,
            },
        )
    }

    fn key(&self, key: &Key, pressed: bool) -> Result<()> {
        let k = key_to(key)?;
        if pressed {
            self.send("key press", rdev::EventType::KeyPress(k))
        } else {
            self.send("key release", rdev::EventType::KeyRelease(k))
        }
    }
}
