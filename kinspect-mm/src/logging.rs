//! Logging support for kinspect-mm
//!
//! Wraps the `log` facade so call sites don't need `#[cfg(feature = "log")]`.

/// Trace-level logging
macro_rules! mm_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::trace!($($arg)*);
    }
}

/// Debug-level logging
macro_rules! mm_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::debug!($($arg)*);
    }
}

pub(crate) use mm_debug;
pub(crate) use mm_trace;
