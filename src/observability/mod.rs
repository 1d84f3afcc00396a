//! # Observability
//!
//! Structured logging for hosts that do not install their own subscriber.
//! Library code only emits `tracing` events; secret values and ciphertext are
//! never recorded, only key names and counts.

pub mod logging;

pub use logging::init_logging;
