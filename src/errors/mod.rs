//! # Error Handling
//!
//! Error types shared by the codec, flattener, store and loader.

pub mod types;

pub use types::{Result, SettingsError};
