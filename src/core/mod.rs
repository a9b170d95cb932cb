//! Core Module
//!
//! This module contains the shared plumbing of the settings engine:
//! - Error taxonomy
//! - Engine configuration
//! - Utility functions

pub mod config;
pub mod error;
pub mod utils;

// Re-export commonly used items
pub use config::EngineConfig;
pub use error::{SettingsError, SettingsResult};
