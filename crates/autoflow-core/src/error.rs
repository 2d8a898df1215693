//! Structured errors, readable by humans and by the `--json` console output

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("[{code:?}] {message}")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// An input capture stream could not be opened
    CaptureUnavailable,
    PermissionDenied,
    /// The injector refused to reproduce an action
    InjectionFailed,
    /// The key has no equivalent on this platform
    UnsupportedKey,
    InvalidConfig,
    InvalidCommand,
    Unknown,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestions: Vec::new(),
            context: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn capture_unavailable(stream: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::CaptureUnavailable,
            format!("Cannot capture {} input: {}", stream, reason),
        )
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message).with_suggestions(vec![
            "Grant input monitoring / accessibility access to the terminal".to_string(),
        ])
    }

    pub fn injection_failed(action: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::InjectionFailed,
            format!("{} failed: {}", action, reason),
        )
    }

    pub fn unsupported_key(key: &str) -> Self {
        Self::new(
            ErrorCode::UnsupportedKey,
            format!("Key '{}' cannot be reproduced on this platform", key),
        )
    }

    pub fn invalid_config(field: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::InvalidConfig,
            format!("Invalid config '{}': {}", field, reason),
        )
    }

    pub fn invalid_command(input: &str) -> Self {
        Self::new(
            ErrorCode::InvalidCommand,
            format!("Unknown command: {}", input),
        )
        .with_suggestions(vec![
            "record, stop, play, halt, +, -, speed <x>, loop <n|on|off>".to_string(),
        ])
    }

    pub fn is_capture_failure(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::CaptureUnavailable | ErrorCode::PermissionDenied
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Self::new(ErrorCode::Unknown, e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorCode::Unknown, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let e = Error::unsupported_key("Hyper");
        assert_eq!(
            e.to_string(),
            "[UnsupportedKey] Key 'Hyper' cannot be reproduced on this platform"
        );
    }

    #[test]
    fn serializes_code_in_screaming_case() {
        let e = Error::capture_unavailable("pointer", "no display");
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["code"], "CAPTURE_UNAVAILABLE");
        assert!(v.get("suggestions").is_none());
        assert!(e.is_capture_failure());
    }
}
