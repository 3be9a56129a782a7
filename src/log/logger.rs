//! Logging backend for the container loader
//!
//! Records go to the `log` facade with `target = category`. Filtering is the
//! facade's max level; with the `logging` feature off every call is a no-op.

use ::log::Level;

/// Change the current log level filter.
pub fn set_log_level(level: ::log::LevelFilter) {
    ::log::set_max_level(level);
}

#[inline]
fn write_log(level: Level, category: &str, message: &str) {
    #[cfg(feature = "logging")]
    {
        ::log::log!(target: category, level, "[{}] {}", category, message);
    }
    #[cfg(not(feature = "logging"))]
    {
        let _ = (level, category, message);
    }
}

// Public log API

pub fn log_trace(category: &str, message: &str) {
    write_log(Level::Trace, category, message);
}

pub fn log_debug(category: &str, message: &str) {
    write_log(Level::Debug, category, message);
}

pub fn log_info(category: &str, message: &str) {
    write_log(Level::Info, category, message);
}

pub fn log_warn(category: &str, message: &str) {
    write_log(Level::Warn, category, message);
}

pub fn log_error(category: &str, message: &str) {
    write_log(Level::Error, category, message);
}

/// Formatted variant used on hot paths to avoid building a `String` when the
/// level is filtered out.
pub fn log_args(level: Level, category: &str, args: core::fmt::Arguments<'_>) {
    #[cfg(feature = "logging")]
    {
        if level <= ::log::max_level() {
            ::log::log!(target: category, level, "[{}] {}", category, args);
        }
    }
    #[cfg(not(feature = "logging"))]
    {
        let _ = (level, category, args);
    }
}
