//! Video renderer

use crate::foundation::collections::{NodeKey, ObjectKey};
use crate::foundation::math::Transform;
use crate::render::renderer::{Renderer, SubmissionItem};
use crate::render::RenderError;

/// Camera selected for a submission
#[derive(Debug, Clone, PartialEq)]
pub struct CameraView {
    /// Camera node
    pub camera: NodeKey,
    /// World transform of the camera
    pub transform: Transform,
    /// Vertical field of view in radians
    pub field_of_view: f32,
}

/// One drawable object of a submission
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    /// Registered object
    pub object: ObjectKey,
    /// World transform
    pub transform: Transform,
}

impl SubmissionItem for DrawItem {
    fn object(&self) -> ObjectKey {
        self.object
    }
}

/// Renderer consuming draw items under a camera
pub type VideoRenderer = Renderer<CameraView, DrawItem>;

impl Renderer<CameraView, DrawItem> {
    /// Select the camera of the open submission
    pub fn set_current_camera(&mut self, view: CameraView) -> Result<(), RenderError> {
        self.set_current(view)
    }

    /// Queue a drawable object
    pub fn push_object_for_rendering(&mut self, item: DrawItem) -> Result<(), RenderError> {
        self.push(item)
    }

    /// Camera of the latest submission
    pub fn current_camera(&self) -> Option<&CameraView> {
        self.current()
    }
}
