//! Core types shared across akshar crates.
//!
//! Provides:
//! - Centralized error types via thiserror
//! - GAN configuration with TOML support

pub mod config;
pub mod error;

pub use config::{GanConfig, NetworkConfig, OptimizerConfig, IMAGE_SIZE};
pub use error::{GanError, GanResult};
