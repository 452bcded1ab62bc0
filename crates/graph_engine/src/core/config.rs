//! # Unified Configuration
//!
//! Engine configuration split per subsystem:
//!
//! - **Graph**: identifier strictness and traversal depth guard
//! - **Renderer**: suspension policy and thread-affinity checks
//! - **Timing**: fixed or variable logic stepping

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};

/// # Graph Configuration
///
/// Controls how the scene graph validates structure during Init/DeInit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Reject nodes whose identifier collides within a namespace
    ///
    /// When disabled a collision is reported as a warning and the first
    /// registered node keeps the identifier.
    pub strict_identifiers: bool,
    /// Maximum traversal depth before a subtree is reported and skipped
    pub max_depth: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            strict_identifiers: true,
            max_depth: 256,
        }
    }
}

/// # Renderer Configuration
///
/// Shared by the video, audio and physics back-ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Evict automatically-suspendable objects that stop being submitted
    pub automatic_suspension: bool,
    /// Number of completed cycles an object may go unsubmitted before eviction
    pub suspend_after_frames: u64,
    /// Fail calls made from a thread other than the registered one
    pub enforce_thread_affinity: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            automatic_suspension: true,
            suspend_after_frames: 1,
            enforce_thread_affinity: cfg!(debug_assertions),
        }
    }
}

/// # Timing Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Fixed logic step in seconds, `None` for variable stepping
    pub logic_step: Option<f64>,
    /// Upper bound of logic steps run for one frame when catching up
    pub max_logic_steps: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            logic_step: None,
            max_logic_steps: 4,
        }
    }
}

/// # Engine Configuration
///
/// Top-level configuration that encompasses all engine subsystems.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log level for the engine
    pub log_level: String,
    /// Scene graph settings
    pub graph: GraphConfig,
    /// Renderer settings
    pub renderer: RendererConfig,
    /// Frame timing settings
    pub timing: TimingConfig,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            graph: GraphConfig::default(),
            renderer: RendererConfig::default(),
            timing: TimingConfig::default(),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Use a fixed logic step
    pub fn with_logic_step(mut self, step: f64) -> Self {
        self.timing.logic_step = Some(step);
        self
    }

    /// Enable or disable automatic suspension of unused renderer objects
    pub fn with_automatic_suspension(mut self, enabled: bool) -> Self {
        self.renderer.automatic_suspension = enabled;
        self
    }

    /// Enable or disable renderer thread-affinity checks
    pub fn with_thread_affinity(mut self, enforced: bool) -> Self {
        self.renderer.enforce_thread_affinity = enforced;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.graph.max_depth == 0 {
            return Err(ConfigError::Invalid("graph.max_depth must be at least 1".to_string()));
        }
        if self.renderer.suspend_after_frames == 0 {
            return Err(ConfigError::Invalid(
                "renderer.suspend_after_frames must be at least 1".to_string(),
            ));
        }
        if let Some(step) = self.timing.logic_step {
            if !(step > 0.0 && step.is_finite()) {
                return Err(ConfigError::Invalid(format!("timing.logic_step must be positive, got {step}")));
            }
        }
        if self.timing.max_logic_steps == 0 {
            return Err(ConfigError::Invalid("timing.max_logic_steps must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for EngineConfig {}
