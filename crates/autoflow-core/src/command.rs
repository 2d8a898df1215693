//! Commands issued by the presentation or hotkey layer

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Stop if recording, start otherwise
    ToggleRecording,
    StartRecording,
    StopRecording,
    /// Play with the current parameter store
    StartPlayback,
    StopPlayback,
    /// Stop whatever is running
    StopAll,
    SpeedUp,
    SpeedDown,
    SetSpeed { speed: f64 },
    SetLoop { enabled: bool, count: u32 },
}

impl FromStr for Command {
    type Err = Error;

    /// Console words: `record`, `stop`, `play`, `halt`, `+`, `-`,
    /// `speed 1.5`, `loop 3`, `loop on`, `loop off`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let head = parts.next().unwrap_or("").to_lowercase();
        let arg = parts.next();
        if parts.next().is_some() {
            return Err(Error::invalid_command(s));
        }

        let cmd = match (head.as_str(), arg) {
            ("r" | "rec" | "record", None) => Command::ToggleRecording,
            ("start", None) => Command::StartRecording,
            ("done" | "finish", None) => Command::StopRecording,
            ("p" | "play", None) => Command::StartPlayback,
            ("halt" | "cancel", None) => Command::StopPlayback,
            ("s" | "stop", None) => Command::StopAll,
            ("+" | "faster", None) => Command::SpeedUp,
            ("-" | "slower", None) => Command::SpeedDown,
            ("speed", Some(v)) => Command::SetSpeed {
                speed: v.parse().map_err(|_| Error::invalid_command(s))?,
            },
            ("loop", Some("on")) => Command::SetLoop {
                enabled: true,
                count: 0,
            },
            ("loop", Some("off")) => Command::SetLoop {
                enabled: false,
                count: 1,
            },
            ("loop", Some(v)) => Command::SetLoop {
                enabled: true,
                count: v.parse().map_err(|_| Error::invalid_command(s))?,
            },
            _ => return Err(Error::invalid_command(s)),
        };
        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn parses_console_words() {
        assert_eq!("record".parse::<Command>().unwrap(), Command::ToggleRecording);
        assert_eq!(" PLAY ".parse::<Command>().unwrap(), Command::StartPlayback);
        assert_eq!("stop".parse::<Command>().unwrap(), Command::StopAll);
        assert_eq!("+".parse::<Command>().unwrap(), Command::SpeedUp);
        assert_eq!(
            "speed 1.5".parse::<Command>().unwrap(),
            Command::SetSpeed { speed: 1.5 }
        );
        assert_eq!(
            "loop 3".parse::<Command>().unwrap(),
            Command::SetLoop {
                enabled: true,
                count: 3
            }
        );
        assert_eq!(
            "loop on".parse::<Command>().unwrap(),
            Command::SetLoop {
                enabled: true,
                count: 0
            }
        );
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "dance", "speed fast", "loop -1", "play now please"] {
            let err = bad.parse::<Command>().unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidCommand, "{bad}");
        }
    }
}
