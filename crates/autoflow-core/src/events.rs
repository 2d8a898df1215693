//! Captured input events and the frozen event store
//!
//! Events keep the order in which the recorder observed them. Pointer and
//! keyboard input arrive on separate streams, so `t` is not guaranteed to be
//! non-decreasing along the sequence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Single event: capture time plus what happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds since the recording epoch
    pub t: f64,
    #[serde(flatten)]
    pub data: EventData,
}

/// Event data - tagged union over pointer and keyboard actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "e", rename_all = "snake_case")]
pub enum EventData {
    Move { x: i32, y: i32 },

    /// Button transition at the pointer position
    Click {
        x: i32,
        y: i32,
        button: MouseButton,
        pressed: bool,
    },

    /// Wheel delta, with the pointer position when it was captured
    Scroll { x: i32, y: i32, dx: i64, dy: i64 },

    KeyPress { key: Key },

    KeyRelease { key: Key },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u8),
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MouseButton::Left => f.write_str("Left"),
            MouseButton::Right => f.write_str("Right"),
            MouseButton::Middle => f.write_str("Middle"),
            MouseButton::Other(n) => write!(f, "Button{}", n),
        }
    }
}

/// Key symbol as reported by the input source
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    /// Platform key name, e.g. `F8`, `KeyA`, `ShiftLeft`
    Named(String),
    /// Raw key code the platform could not name
    Code(u32),
}

impl Key {
    pub fn named(name: impl Into<String>) -> Self {
        Key::Named(name.into())
    }

    /// Case-insensitive match against a key name such as `"f8"`
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Key::Named(n) => n.eq_ignore_ascii_case(name),
            Key::Code(c) => name.parse::<u32>().map(|n| n == *c).unwrap_or(false),
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Named(a), Key::Named(b)) => a.eq_ignore_ascii_case(b),
            (Key::Code(a), Key::Code(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Named(n) => f.write_str(n),
            Key::Code(c) => write!(f, "#{}", c),
        }
    }
}

/// Coarse event kind, used for stats and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Move,
    Click,
    Scroll,
    Key,
}

impl Event {
    pub fn new(t: f64, data: EventData) -> Self {
        Self { t, data }
    }

    pub fn kind(&self) -> EventKind {
        match self.data {
            EventData::Move { .. } => EventKind::Move,
            EventData::Click { .. } => EventKind::Click,
            EventData::Scroll { .. } => EventKind::Scroll,
            EventData::KeyPress { .. } | EventData::KeyRelease { .. } => EventKind::Key,
        }
    }

    /// Offset from the epoch; negative or non-finite stamps read as zero
    pub fn offset(&self) -> Duration {
        if self.t.is_finite() && self.t > 0.0 {
            Duration::from_secs_f64(self.t)
        } else {
            Duration::ZERO
        }
    }

    /// Row text for the live event list
    pub fn label(&self) -> String {
        match &self.data {
            EventData::Move { x, y } => format!("Move {},{}", x, y),
            EventData::Click {
                button, pressed, ..
            } => {
                if *pressed && *button == MouseButton::Left {
                    "Click".to_string()
                } else if *pressed {
                    format!("Click {}", button)
                } else {
                    format!("Release {}", button)
                }
            }
            EventData::Scroll { dx, dy, .. } => format!("Scroll {},{}", dx, dy),
            EventData::KeyPress { key } => format!("Press {}", key),
            EventData::KeyRelease { key } => format!("Release {}", key),
        }
    }

    /// Clicks and key events are echoed to observers while recording
    pub fn is_echoed(&self) -> bool {
        !matches!(
            self.data,
            EventData::Move { .. } | EventData::Scroll { .. }
        )
    }
}

/// Frozen, ordered recording shared between the session and playback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStore {
    events: Arc<[Event]>,
    started_at: DateTime<Utc>,
    /// Seconds between the epoch and the moment capture stopped
    duration: f64,
}

impl EventStore {
    pub fn new(events: Vec<Event>, started_at: DateTime<Utc>, duration: f64) -> Self {
        Self {
            events: events.into(),
            started_at,
            duration,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Utc::now(), 0.0)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Number of events of the given kind
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a> IntoIterator for &'a EventStore {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(t: f64, pressed: bool) -> Event {
        Event::new(
            t,
            EventData::Click {
                x: 10,
                y: 20,
                button: MouseButton::Left,
                pressed,
            },
        )
    }

    #[test]
    fn labels_follow_event_list_wording() {
        assert_eq!(click(0.5, true).label(), "Click");
        assert_eq!(click(0.6, false).label(), "Release Left");
        let press = Event::new(1.2, EventData::KeyPress { key: Key::named("KeyA") });
        assert_eq!(press.label(), "Press KeyA");
        let code = Event::new(1.3, EventData::KeyRelease { key: Key::Code(179) });
        assert_eq!(code.label(), "Release #179");
    }

    #[test]
    fn only_clicks_and_keys_are_echoed() {
        assert!(click(0.0, true).is_echoed());
        assert!(!Event::new(0.0, EventData::Move { x: 1, y: 1 }).is_echoed());
        assert!(!Event::new(
            0.0,
            EventData::Scroll {
                x: 0,
                y: 0,
                dx: 0,
                dy: -1
            }
        )
        .is_echoed());
    }

    #[test]
    fn key_names_compare_case_insensitively() {
        assert_eq!(Key::named("F8"), Key::named("f8"));
        assert!(Key::named("F10").matches("f10"));
        assert!(!Key::named("F1").matches("f10"));
        assert!(Key::Code(42).matches("42"));
        assert_ne!(Key::named("42"), Key::Code(42));
    }

    #[test]
    fn offset_clamps_bad_stamps() {
        assert_eq!(click(-1.0, true).offset(), Duration::ZERO);
        assert_eq!(click(f64::NAN, true).offset(), Duration::ZERO);
        assert_eq!(click(0.25, true).offset(), Duration::from_millis(250));
    }

    #[test]
    fn store_keeps_insertion_order() {
        let store = EventStore::new(vec![click(0.4, true), click(0.3, false)], Utc::now(), 1.0);
        let ts: Vec<f64> = store.iter().map(|e| e.t).collect();
        assert_eq!(ts, vec![0.4, 0.3]);
        assert_eq!(store.count(EventKind::Click), 2);
        assert_eq!(store.count(EventKind::Key), 0);
    }

    #[test]
    fn event_serializes_flat() {
        let v = serde_json::to_value(click(0.5, true)).unwrap();
        assert_eq!(v["e"], "click");
        assert_eq!(v["button"], "left");
        assert_eq!(v["t"], 0.5);
    }
}
