//! Physics simulator
//!
//! Shares the renderer protocol: a submission collects bodies for one
//! island and a render cycle steps the simulation.

use crate::foundation::collections::{NodeKey, ObjectKey};
use crate::foundation::math::{Transform, Vec3};
use crate::render::renderer::{Renderer, SubmissionItem};
use crate::render::RenderError;

/// Island selected for a submission
#[derive(Debug, Clone, PartialEq)]
pub struct IslandState {
    /// Island node
    pub island: NodeKey,
    /// Gravity of the island
    pub gravity: Vec3,
}

/// One simulated body of a submission
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationItem {
    /// Registered body object
    pub object: ObjectKey,
    /// World transform
    pub transform: Transform,
}

impl SubmissionItem for SimulationItem {
    fn object(&self) -> ObjectKey {
        self.object
    }
}

/// Simulator stepping bodies of an island
pub type PhysicsSimulator = Renderer<IslandState, SimulationItem>;

impl Renderer<IslandState, SimulationItem> {
    /// Select the island of the open submission
    pub fn set_current_island(&mut self, island: IslandState) -> Result<(), RenderError> {
        self.set_current(island)
    }

    /// Queue a body
    pub fn push_object_for_simulation(&mut self, item: SimulationItem) -> Result<(), RenderError> {
        self.push(item)
    }

    /// Start stepping the latest submission
    pub fn begin_simulation(&mut self, trigger_suspend: bool) -> Result<usize, RenderError> {
        self.begin_rendering(trigger_suspend)
    }

    /// Finish the step
    pub fn end_simulation(&mut self) -> Result<(), RenderError> {
        self.end_rendering()
    }
}
