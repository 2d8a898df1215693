//! autoflow-core - event model for input recording and replay
//!
//! Plain data and the seams to the host:
//!
//! - [`events`]: captured events and the frozen [`EventStore`]
//! - [`input`]: [`InputSource`] / [`InputInjector`] traits
//! - [`command`]: resolved commands from the UI or hotkey layer
//! - [`error`]: structured errors

pub mod command;
pub mod error;
pub mod events;
pub mod input;

pub use command::Command;
pub use error::{Error, ErrorCode, Result};
pub use events::{Event, EventData, EventKind, EventStore, Key, MouseButton};
pub use input::{
    CaptureStream, InputCallback, InputInjector, InputSource, RawInput, Subscription,
};

pub mod prelude {
    pub use crate::command::Command;
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::events::{Event, EventData, EventKind, EventStore, Key, MouseButton};
    pub use crate::input::{
        CaptureStream, InputCallback, InputInjector, InputSource, RawInput, Subscription,
    };
}
