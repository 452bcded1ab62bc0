//! # Graph Engine
//!
//! Retained-mode scene graph core: nodes and controllers with a managed
//! lifecycle, traversal trackers, time controllers with blend
//! normalization, target resolution, and a renderer submission protocol
//! with object suspension.
//!
//! ## Features
//!
//! - **Scene Graph**: Arena-backed DAG of nodes with Init/DeInit cascades
//! - **Controllers**: Time, variable and link controllers attached to nodes
//! - **Trackers**: Per-traversal context carrying diagnostics and scoped state
//! - **Renderers**: Video, audio and physics submission with suspension
//! - **Templates**: Scene graphs built from TOML or RON documents
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use graph_engine::prelude::*;
//!
//! struct MyApp;
//!
//! impl Application for MyApp {
//!     fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
//!         let (root, factory) = engine.parts_mut();
//!         let group = root.create_node("Group", factory)?;
//!         let parent = root.root_node();
//!         root.init_graph(group, parent, None, LockMode::Acquire)?;
//!         Ok(())
//!     }
//!
//!     fn update(&mut self, _engine: &mut Engine, _delta_time: f64) -> Result<(), AppError> {
//!         Ok(())
//!     }
//!
//!     fn cleanup(&mut self, _engine: &mut Engine) {}
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     let mut app = MyApp;
//!     Engine::run(config, &mut app, Some(60))?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod control;
pub mod controller;
pub mod core;
pub mod foundation;
pub mod graph;
pub mod registry;
pub mod render;
pub mod resource;
pub mod target;
pub mod tracker;

mod application;
mod engine;

pub use application::{AppError, Application};
pub use control::Control;
pub use engine::{Engine, EngineError, StepReport};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        control::{Control, ScriptedInput},
        controller::{Controller, ControllerBehavior, ControllerContext, ControllerState, NodeLinkMode},
        core::{Config, ConfigFormat, EngineConfig},
        foundation::{
            collections::{ControllerKey, NodeKey, ObjectKey, ResourceKey},
            math::{Quat, Transform, Vec3},
            time::Timer,
        },
        graph::{GraphError, LockMode, NodeBehavior, NodeContext, PropertyValue, Root},
        registry::ObjectFactory,
        render::{RenderError, Renderers, SuspensionPolicy},
        resource::{Animation, GraphFactory, GraphTemplate, Resource, ResourceTarget},
        target::NodeTarget,
        tracker::{FrameTime, InputEvent, Tracker, TraversalMask},
        AppError, Application, Engine, EngineError, StepReport,
    };
}
