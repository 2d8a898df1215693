//! Input macro recorder
//!
//! Records pointer and keyboard activity, then plays it back with the
//! original timing, scaled by a speed factor and optionally looped.
//!
//! ## Features
//!
//! - **recording**: pointer moves, clicks, scrolls and key events, stamped
//!   relative to the start of the recording
//! - **playback**: speed in 0.5x..=2.0x, single pass, N passes or until stopped
//! - **control**: one session state machine driven by commands or hotkeys
//! - **native**: OS capture and injection (cargo feature `native`)

pub use autoflow_core as core;
pub use autoflow_recorder as recorder;

pub use autoflow_core::{
    Command, Error, ErrorCode, Event, EventData, EventKind, EventStore, Key, MouseButton, Result,
};
pub use autoflow_recorder::{
    platform, ChannelObserver, Config, HotkeyMap, Notification, Observer, PlaybackParameters,
    PlaybackReport, Session, SessionState,
};

use std::sync::Arc;

/// Session wired to the best input backend of this build
pub fn session(config: &Config, observer: Arc<dyn Observer>) -> Session {
    let (source, injector) = platform::default_backend();
    Session::new(config, source, injector, observer)
}

/// Fail early when this build cannot capture real input
pub fn ensure_native_input() -> Result<()> {
    if platform::has_native_input() {
        return Ok(());
    }
    Err(Error::capture_unavailable(
        "native",
        "built without native input support",
    )
    .with_suggestions(vec!["Rebuild with `--features native`".to_string()]))
}

pub mod prelude {
    pub use autoflow_core::prelude::*;
    pub use autoflow_recorder::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoflow_recorder::NoopObserver;

    #[test]
    fn default_session_starts_idle() {
        let s = session(&Config::default(), Arc::new(NoopObserver));
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(
            ensure_native_input().is_ok(),
            platform::has_native_input()
        );
    }
}
