//! Fallback backends for builds without OS input support

use autoflow_core::{
    CaptureStream, Error, InputCallback, InputInjector, InputSource, Key, MouseButton, Result,
    Subscription,
};
use tracing::info;

/// Source that cannot capture anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSource;

impl InputSource for NullSource {
    fn subscribe(&self, stream: CaptureStream, _callback: InputCallback) -> Result<Subscription> {
        Err(
            Error::capture_unavailable(&stream.to_string(), "built without native input support")
                .with_suggestions(vec!["Rebuild with `--features native`".to_string()]),
        )
    }
}

/// Injector that only logs what it would do
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunInjector;

impl InputInjector for DryRunInjector {
    fn move_to(&self, x: i32, y: i32) -> Result<()> {
        info!(target: "autoflow::dry_run", x, y, "move");
        Ok(())
    }

    fn button(&self, button: MouseButton, pressed: bool) -> Result<()> {
        info!(target: "autoflow::dry_run", %button, pressed, "button");
        Ok(())
    }

    fn scroll(&self, dx: i64, dy: i64) -> Result<()> {
        info!(target: "autoflow::dry_run", dx, dy, "scroll");
        Ok(())
    }

    fn key(&self, key: &Key, pressed: bool) -> Result<()> {
        info!(target: "autoflow::dry_run", %key, pressed, "key");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoflow_core::ErrorCode;
    use std::sync::Arc;

    #[test]
    fn null_source_fails_closed() {
        let err = NullSource
            .subscribe(CaptureStream::Pointer, Arc::new(|_| {}))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CaptureUnavailable);
        assert!(!err.suggestions.is_empty());
    }
}
