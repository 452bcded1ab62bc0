//! Application trait and lifecycle management

use crate::engine::{Engine, EngineError};
use crate::graph::GraphError;
use thiserror::Error;

/// Application lifecycle trait
///
/// Implement this trait to drive a scene graph with [`Engine::run`].
pub trait Application {
    /// Initialize the application
    ///
    /// Called once after the engine is initialized. Build and initialize the
    /// scene graph here.
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError>;

    /// Update the application
    ///
    /// Called every frame before the engine step.
    ///
    /// # Arguments
    /// * `engine` - Mutable reference to the engine
    /// * `delta_time` - Time since last frame in seconds
    fn update(&mut self, engine: &mut Engine, delta_time: f64) -> Result<(), AppError>;

    /// Cleanup the application
    ///
    /// Called once when the loop ends, before the engine tears the graph down.
    fn cleanup(&mut self, engine: &mut Engine);
}

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Engine error propagated to application level
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Scene graph error
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Custom application error
    #[error("Application error: {0}")]
    Custom(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}
