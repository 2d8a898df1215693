//! Input backends
//!
//! Provides the sources and injectors the session can be wired to.

pub mod memory;
pub mod null;

#[cfg(feature = "native")]
pub mod native;

use autoflow_core::{InputInjector, InputSource};
use std::sync::Arc;

/// Best source/injector pair for this build
pub fn default_backend() -> (Arc<dyn InputSource>, Arc<dyn InputInjector>) {
    #[cfg(feature = "native")]
    {
        (Arc::new(native::NativeSource), Arc::new(native::NativeInjector))
    }

    #[cfg(not(feature = "native"))]
    {
        (Arc::new(null::NullSource), Arc::new(null::DryRunInjector))
    }
}

/// Whether this build can touch real input devices
pub fn has_native_input() -> bool {
    cfg!(feature = "native")
}
