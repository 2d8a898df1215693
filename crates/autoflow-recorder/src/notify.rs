//! Notifications for the presentation layer
//!
//! Observers are called from whichever thread produced the notification
//! (capture callbacks, the playback worker, the caller of a command) and
//! never while an internal lock is held.

use crate::replay::PlaybackReport;
use crossbeam_channel::Sender;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    RecordingStarted,
    /// Live echo of a captured click or key event
    EventCaptured { elapsed: f64, label: String },
    RecordingStopped { count: usize },
    PlaybackStarted {
        events: usize,
        speed: f64,
        loop_enabled: bool,
        loop_count: u32,
    },
    InjectionFailed { index: usize, message: String },
    PlaybackFinished { report: PlaybackReport },
    PlaybackCancelled { report: PlaybackReport },
    SpeedChanged { speed: f64 },
    Stopped,
}

impl Notification {
    /// Status line text
    pub fn status(&self) -> String {
        match self {
            Notification::RecordingStarted => "Recording...".to_string(),
            Notification::EventCaptured { elapsed, label } => format!("{:>8.2}  {}", elapsed, label),
            Notification::RecordingStopped { count } => format!("Recorded {} events", count),
            Notification::PlaybackStarted {
                events,
                speed,
                loop_enabled,
                loop_count,
            } => {
                let loops = match (loop_enabled, loop_count) {
                    (false, _) => "once".to_string(),
                    (true, 0) => "looping".to_string(),
                    (true, n) => format!("{} times", n),
                };
                format!("Playing {} events at {:.1}x, {}", events, speed, loops)
            }
            Notification::InjectionFailed { index, message } => {
                format!("Event #{} not reproduced: {}", index, message)
            }
            Notification::PlaybackFinished { .. } => "Playback finished".to_string(),
            Notification::PlaybackCancelled { .. } => "Playback cancelled".to_string(),
            Notification::SpeedChanged { speed } => format!("Speed: {:.1}x", speed),
            Notification::Stopped => "Stopped".to_string(),
        }
    }
}

/// Receives notifications from the session
pub trait Observer: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl<F> Observer for F
where
    F: Fn(Notification) + Send + Sync,
{
    fn notify(&self, notification: Notification) {
        self(notification)
    }
}

/// Forwards into a channel, e.g. for a UI loop on another thread
#[derive(Debug, Clone)]
pub struct ChannelObserver(Sender<Notification>);

impl ChannelObserver {
    pub fn new(tx: Sender<Notification>) -> Self {
        Self(tx)
    }
}

impl Observer for ChannelObserver {
    fn notify(&self, notification: Notification) {
        // A gone receiver means nobody is listening any more
        let _ = self.0.send(notification);
    }
}

/// Drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn notify(&self, _notification: Notification) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_observer_forwards() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let observer = ChannelObserver::new(tx);
        observer.notify(Notification::RecordingStopped { count: 3 });
        assert_eq!(rx.try_recv().unwrap(), Notification::RecordingStopped { count: 3 });

        drop(rx);
        // no panic with the receiver gone
        observer.notify(Notification::Stopped);
    }

    #[test]
    fn status_lines() {
        assert_eq!(
            Notification::SpeedChanged { speed: 1.1 }.status(),
            "Speed: 1.1x"
        );
        assert_eq!(
            Notification::PlaybackStarted {
                events: 4,
                speed: 2.0,
                loop_enabled: true,
                loop_count: 0
            }
            .status(),
            "Playing 4 events at 2.0x, looping"
        );
        let v = serde_json::to_value(Notification::RecordingStopped { count: 2 }).unwrap();
        assert_eq!(v["event"], "recording_stopped");
        assert_eq!(v["count"], 2);
    }
}
