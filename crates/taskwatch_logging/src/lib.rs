#![deny(missing_docs)]
//! Shared logging utilities for the taskwatch workspace.
//!
//! This crate provides the `watch_*` logging macros used by the engine and
//! the app, and a minimal test initializer for the global logger. Every
//! message is prefixed with the poll cycle the engine is currently in, so a
//! log line can be tied to the fetch that produced it.

use std::sync::atomic::{AtomicU64, Ordering};

#[doc(hidden)]
pub use log;

/// Log target shared by all `watch_*` macros.
pub const TARGET: &str = "taskwatch";

// The engine loop runs on whatever worker thread tokio picks, so the cycle
// lives in a process-wide atomic rather than a thread-local.
static POLL_CYCLE: AtomicU64 = AtomicU64::new(0);

/// Records the poll cycle the engine has just started.
/// Called by the engine loop every time it issues a fetch.
pub fn set_poll_cycle(cycle: u64) {
    POLL_CYCLE.store(cycle, Ordering::Relaxed);
}

/// Returns the most recently recorded poll cycle, 0 before the first fetch.
pub fn poll_cycle() -> u64 {
    POLL_CYCLE.load(Ordering::Relaxed)
}

/// Logs a trace-level message tagged with the current poll cycle.
#[macro_export]
macro_rules! watch_trace {
    ($($arg:tt)*) => {{
        $crate::log::trace!(target: $crate::TARGET, "[cycle {}] {}", $crate::poll_cycle(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message tagged with the current poll cycle.
#[macro_export]
macro_rules! watch_debug {
    ($($arg:tt)*) => {{
        $crate::log::debug!(target: $crate::TARGET, "[cycle {}] {}", $crate::poll_cycle(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message tagged with the current poll cycle.
#[macro_export]
macro_rules! watch_info {
    ($($arg:tt)*) => {{
        $crate::log::info!(target: $crate::TARGET, "[cycle {}] {}", $crate::poll_cycle(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message tagged with the current poll cycle.
#[macro_export]
macro_rules! watch_warn {
    ($($arg:tt)*) => {{
        $crate::log::warn!(target: $crate::TARGET, "[cycle {}] {}", $crate::poll_cycle(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message tagged with the current poll cycle.
#[macro_export]
macro_rules! watch_error {
    ($($arg:tt)*) => {{
        $crate::log::error!(target: $crate::TARGET, "[cycle {}] {}", $crate::poll_cycle(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
