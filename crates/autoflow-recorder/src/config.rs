//! Configuration management

use crate::recorder::RecorderConfig;
use crate::replay::{PlaybackParameters, MAX_SPEED, MIN_SPEED};
use autoflow_core::{Command, Error, Key, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default speed step for speed up / speed down
pub const SPEED_STEP: f64 = 0.1;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Increment applied by speed up / speed down
    pub speed_step: f64,
    /// Initial playback parameters
    pub playback: PlaybackParameters,
    pub hotkeys: HotkeyMap,
    pub recorder: RecorderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speed_step: SPEED_STEP,
            playback: PlaybackParameters::default(),
            hotkeys: HotkeyMap::default(),
            recorder: RecorderConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| Error::invalid_config("toml", &e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::invalid_config("toml", &e.to_string()))
    }

    /// Check values are within acceptable ranges
    pub fn validate(&self) -> Result<()> {
        let s = self.playback.speed;
        if !s.is_finite() || !(MIN_SPEED..=MAX_SPEED).contains(&s) {
            return Err(Error::invalid_config(
                "playback.speed",
                &format!("{} is outside {}..={}", s, MIN_SPEED, MAX_SPEED),
            ));
        }
        if !(self.speed_step > 0.0 && self.speed_step <= MAX_SPEED - MIN_SPEED) {
            return Err(Error::invalid_config(
                "speed_step",
                &format!("{} must be in (0, {}]", self.speed_step, MAX_SPEED - MIN_SPEED),
            ));
        }
        self.hotkeys.validate()
    }

    /// Recorder settings with the hotkeys added to the ignored keys
    pub fn effective_recorder(&self) -> RecorderConfig {
        let mut recorder = self.recorder.clone();
        if !self.recorder.record_hotkeys {
            for name in self.hotkeys.names() {
                if !recorder.ignored_keys.iter().any(|k| k.eq_ignore_ascii_case(name)) {
                    recorder.ignored_keys.push(name.to_string());
                }
            }
        }
        recorder
    }
}

/// Key names bound to commands. Binding them to the OS is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyMap {
    pub record: String,
    pub play: String,
    pub stop: String,
    pub speed_up: String,
    pub speed_down: String,
}

impl Default for HotkeyMap {
    fn default() -> Self {
        Self {
            record: "f8".to_string(),
            play: "f9".to_string(),
            stop: "f10".to_string(),
            speed_up: "f11".to_string(),
            speed_down: "f12".to_string(),
        }
    }
}

impl HotkeyMap {
    pub fn names(&self) -> [&str; 5] {
        [
            self.record.as_str(),
            self.play.as_str(),
            self.stop.as_str(),
            self.speed_up.as_str(),
            self.speed_down.as_str(),
        ]
    }

    /// Command bound to a pressed key
    pub fn resolve(&self, key: &Key) -> Option<Command> {
        if key.matches(&self.record) {
            Some(Command::ToggleRecording)
        } else if key.matches(&self.play) {
            Some(Command::StartPlayback)
        } else if key.matches(&self.stop) {
            Some(Command::StopAll)
        } else if key.matches(&self.speed_up) {
            Some(Command::SpeedUp)
        } else if key.matches(&self.speed_down) {
            Some(Command::SpeedDown)
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<()> {
        let names = self.names();
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(Error::invalid_config("hotkeys", "key names must not be empty"));
            }
            if names[..i].iter().any(|n| n.eq_ignore_ascii_case(name)) {
                return Err(Error::invalid_config(
                    "hotkeys",
                    &format!("'{}' is bound twice", name),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoflow_core::ErrorCode;

    #[test]
    fn default_hotkeys_are_f8_to_f12() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        let keys = &config.hotkeys;
        assert_eq!(keys.resolve(&Key::named("F8")), Some(Command::ToggleRecording));
        assert_eq!(keys.resolve(&Key::named("F9")), Some(Command::StartPlayback));
        assert_eq!(keys.resolve(&Key::named("F10")), Some(Command::StopAll));
        assert_eq!(keys.resolve(&Key::named("F11")), Some(Command::SpeedUp));
        assert_eq!(keys.resolve(&Key::named("F12")), Some(Command::SpeedDown));
        assert_eq!(keys.resolve(&Key::named("KeyA")), None);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            speed_step = 0.25

            [playback]
            speed = 1.5
            loop_enabled = true

            [hotkeys]
            record = "f5"
            "#,
        )
        .unwrap();
        assert_eq!(config.speed_step, 0.25);
        assert_eq!(config.playback.speed, 1.5);
        assert!(config.playback.loop_enabled);
        assert_eq!(config.playback.loop_count, 1);
        assert_eq!(config.hotkeys.record, "f5");
        assert_eq!(config.hotkeys.play, "f9");
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = Config::from_toml("[playback]\nspeed = 3.0\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
        assert!(Config::from_toml("speed_step = 0.0\n").is_err());
        assert!(Config::from_toml("[hotkeys]\nplay = \"F8\"\n").is_err());
        assert!(Config::from_toml("[hotkeys]\nstop = \" \"\n").is_err());
        assert!(Config::from_toml("not toml at all = = =").is_err());
    }

    #[test]
    fn hotkeys_are_ignored_while_recording_by_default() {
        let config = Config::default();
        let recorder = config.effective_recorder();
        assert!(recorder.ignored_keys.iter().any(|k| k == "f8"));
        assert_eq!(recorder.ignored_keys.len(), 5);

        let mut keep = Config::default();
        keep.recorder.record_hotkeys = true;
        assert!(keep.effective_recorder().ignored_keys.is_empty());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autoflow.toml");
        let mut config = Config::default();
        config.playback.loop_count = 4;
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }
}
