//! Process-wide logging switch.
//!
//! All crate logging goes through the macros below so that `logging = false`
//! silences the server entirely. Info-level messages are emitted only in dev
//! mode; warnings and errors whenever logging is enabled.

use std::sync::atomic::{AtomicBool, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(true);
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Apply the `logging` and `dev` config flags.
pub fn configure(enabled: bool, dev: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
    VERBOSE.store(enabled && dev, Ordering::Relaxed);
}

pub fn enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

pub fn verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

macro_rules! log_info {
    ($($arg:tt)*) => {
        if $crate::backend::logging::verbose() {
            ::tracing::info!($($arg)*);
        }
    };
}

macro_rules! log_warn {
    ($($arg:tt)*) => {
        if $crate::backend::logging::enabled() {
            ::tracing::warn!($($arg)*);
        }
    };
}

macro_rules! log_error {
    ($($arg:tt)*) => {
        if $crate::backend::logging::enabled() {
            ::tracing::error!($($arg)*);
        }
    };
}

pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_warn;
