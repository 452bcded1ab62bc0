//! Audio renderer

use crate::foundation::collections::{NodeKey, ObjectKey};
use crate::foundation::math::{Transform, Vec3};
use crate::render::renderer::{Renderer, SubmissionItem};
use crate::render::RenderError;

/// Listener selected for a submission
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerState {
    /// Listener node
    pub listener: NodeKey,
    /// World transform of the listener
    pub transform: Transform,
    /// Master gain
    pub gain: f32,
}

/// One playing sound of a submission
#[derive(Debug, Clone, PartialEq)]
pub struct PlayItem {
    /// Registered sound object
    pub object: ObjectKey,
    /// World position of the emitter
    pub position: Vec3,
    /// Emitter gain
    pub gain: f32,
}

impl PlayItem {
    /// Gain after distance attenuation relative to `listener`
    pub fn attenuated_gain(&self, listener: &ListenerState) -> f32 {
        let distance = (self.position - listener.transform.position).norm();
        self.gain * listener.gain / (1.0 + distance)
    }
}

impl SubmissionItem for PlayItem {
    fn object(&self) -> ObjectKey {
        self.object
    }
}

/// Renderer mixing sounds relative to a listener
pub type AudioRenderer = Renderer<ListenerState, PlayItem>;

impl Renderer<ListenerState, PlayItem> {
    /// Select the listener of the open submission
    pub fn set_current_listener(&mut self, listener: ListenerState) -> Result<(), RenderError> {
        self.set_current(listener)
    }

    /// Queue a sound object
    pub fn push_object_for_playing(&mut self, item: PlayItem) -> Result<(), RenderError> {
        self.push(item)
    }

    /// Listener of the latest submission
    pub fn current_listener(&self) -> Option<&ListenerState> {
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gain_attenuates_with_distance() {
        let listener = ListenerState {
            listener: NodeKey::default(),
            transform: Transform::identity(),
            gain: 1.0,
        };
        let near = PlayItem {
            object: ObjectKey::default(),
            position: Vec3::zeros(),
            gain: 0.5,
        };
        let far = PlayItem {
            position: Vec3::new(3.0, 0.0, 0.0),
            ..near.clone()
        };
        assert_relative_eq!(near.attenuated_gain(&listener), 0.5);
        assert_relative_eq!(far.attenuated_gain(&listener), 0.125);
    }
}
