//! autoflow-recorder - capture and timed replay of user input
//!
//! Records pointer and keyboard events with their offsets from the start of
//! a recording, then plays them back through an injector at a chosen speed,
//! once, a fixed number of times, or until stopped.
//!
//! ## Backends
//!
//! - **memory**: in-process source and injector, used by tests
//! - **null**: capture unavailable, playback only logged
//! - **native** (feature `native`): OS input via rdev

pub mod config;
pub mod notify;
pub mod platform;
pub mod recorder;
pub mod replay;
pub mod session;

pub use config::{Config, HotkeyMap};
pub use notify::{ChannelObserver, NoopObserver, Notification, Observer};
pub use recorder::{EventRecorder, RecorderConfig, RecordingHandle};
pub use replay::{
    CancelToken, PlaybackHandle, PlaybackParameters, PlaybackReport, PlaybackScheduler,
    MAX_SPEED, MIN_SPEED,
};
pub use session::{Session, SessionState};

pub mod prelude {
    pub use crate::config::{Config, HotkeyMap};
    pub use crate::notify::{ChannelObserver, Notification, Observer};
    pub use crate::recorder::{EventRecorder, RecorderConfig};
    pub use crate::replay::{PlaybackParameters, PlaybackReport, PlaybackScheduler};
    pub use crate::session::{Session, SessionState};
}
