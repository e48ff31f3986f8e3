//! Unified logging support for kinspect-syscalls
//!
//! Wraps the `log` facade so call sites don't need `#[cfg(feature = "log")]`.

/// Unified trace-level logging
#[macro_export]
macro_rules! sys_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::trace!($($arg)*);
    }
}

/// Unified debug-level logging
#[macro_export]
macro_rules! sys_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::debug!($($arg)*);
    }
}

/// Unified info-level logging
#[macro_export]
macro_rules! sys_info {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::info!($($arg)*);
    }
}

/// Unified warn-level logging
#[macro_export]
macro_rules! sys_warn {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::warn!($($arg)*);
    }
}
