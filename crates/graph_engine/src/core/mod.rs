//! # Core Engine Module
//!
//! Shared engine-wide settings. Subsystems receive the part of
//! [`EngineConfig`] that concerns them rather than the whole document.

pub mod config;

pub use config::{EngineConfig, GraphConfig, RendererConfig, TimingConfig};
pub use crate::config::{Config, ConfigError, ConfigFormat};
