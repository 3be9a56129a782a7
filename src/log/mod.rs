//! Logging module
//!
//! Category-based logging API. The backend is in `logger.rs` and forwards to
//! the `log` facade; the platform decides where records end up (serial port,
//! console, ring buffer).

pub mod logger;
