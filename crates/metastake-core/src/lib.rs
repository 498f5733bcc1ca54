//! Core domain logic for the staking front-end.
//!
//! This crate provides:
//! - Fixed-point amount codec (`amount` module)
//! - Core domain types (`types` module)
//! - Pre-flight action validation (`validation` module)
//! - Display types for UI (`display` module)
//!
//! With the `persistence` feature enabled:
//! - Configuration loading and saving (`config` module)
//!
//! Without it, only the in-memory configuration types are available.

pub mod amount;
pub mod config;
pub mod display;
pub mod types;
pub mod validation;

// Re-export commonly used items from core modules
pub use amount::*;
pub use config::{AppConfig, ConfigError, ControllerConfig};
pub use display::*;
pub use types::*;
pub use validation::*;
