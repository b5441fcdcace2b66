#![deny(missing_docs)]
//! Shared logging utilities for the deploy tracker workspace.
//!
//! This crate provides the `deploy_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger. Every message is
//! prefixed with the poll tick the current thread is processing, so a log file
//! can be read back tick by tick.

use std::cell::Cell;

#[doc(hidden)]
pub use log as __log;

thread_local! {
    /// Thread-local storage for the poll tick currently being processed.
    static POLL_TICK: Cell<u64> = const { Cell::new(0) };
}

/// Sets the poll tick for the current thread.
/// The session driver calls this once at the start of every tick.
pub fn set_poll_tick(tick: u64) {
    POLL_TICK.with(|v| v.set(tick));
}

/// Retrieves the poll tick for the current thread.
/// Returns 0 outside of a polling loop.
pub fn poll_tick() -> u64 {
    POLL_TICK.with(|v| v.get())
}

/// Logs a trace-level message tagged with the current poll tick.
#[macro_export]
macro_rules! deploy_trace {
    ($($arg:tt)*) => {{
        $crate::__log::trace!("[tick {}] {}", $crate::poll_tick(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message tagged with the current poll tick.
#[macro_export]
macro_rules! deploy_debug {
    ($($arg:tt)*) => {{
        $crate::__log::debug!("[tick {}] {}", $crate::poll_tick(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message tagged with the current poll tick.
#[macro_export]
macro_rules! deploy_info {
    ($($arg:tt)*) => {{
        $crate::__log::info!("[tick {}] {}", $crate::poll_tick(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message tagged with the current poll tick.
#[macro_export]
macro_rules! deploy_warn {
    ($($arg:tt)*) => {{
        $crate::__log::warn!("[tick {}] {}", $crate::poll_tick(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message tagged with the current poll tick.
#[macro_export]
macro_rules! deploy_error {
    ($($arg:tt)*) => {{
        $crate::__log::error!("[tick {}] {}", $crate::poll_tick(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
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
