//! Renderer submission protocol
//!
//! Three renderers consume the output traversal: video, audio and physics.
//! Each follows the same cycle:
//!
//! ```text
//! logic thread:   begin_submission -> set_current/push* -> end_submission
//! render thread:  begin_rendering(trigger_suspend) -> end_rendering
//! ```
//!
//! Objects registered with a renderer are suspended when unused and resumed
//! when pushed again; [`RenderStats`] tracks their resident bytes.

pub mod audio;
pub mod backend;
pub mod object;
pub mod physics;
pub mod protocol;
pub mod renderer;
pub mod stats;
pub mod threads;
pub mod video;

use thiserror::Error;

use crate::core::RendererConfig;
use crate::foundation::collections::ObjectKey;

pub use audio::{AudioRenderer, ListenerState, PlayItem};
pub use backend::{Backend, BackendResult, NullBackend, RecordedBatch, RecordingBackend, RecordingLog};
pub use object::{ObjectState, ObjectTable, RendererObject, ResourceObject, SuspensionPolicy};
pub use physics::{IslandState, PhysicsSimulator, SimulationItem};
pub use protocol::{SubmissionCore, SubmissionState};
pub use renderer::{Renderer, SubmissionItem};
pub use stats::RenderStats;
pub use threads::{ThreadRole, ThreadRoles};
pub use video::{CameraView, DrawItem, VideoRenderer};

/// Renderer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Set or push outside Begin/EndSubmission
    #[error("push outside of a submission (renderer is {0})")]
    NotSubmitting(SubmissionState),

    /// Protocol call made in the wrong submission state
    #[error("renderer is {actual}, expected {expected}")]
    WrongState {
        /// State the call requires
        expected: SubmissionState,
        /// State the renderer was in
        actual: SubmissionState,
    },

    /// Renderer has not been initialized
    #[error("renderer is not initialized")]
    NotInitialized,

    /// Device is suspended
    #[error("renderer device is suspended")]
    DeviceSuspended,

    /// Object key no longer registered
    #[error("stale renderer object {0:?}")]
    StaleObject(ObjectKey),

    /// Object failed to acquire its resources
    #[error("renderer object failed to initialize: {0}")]
    ObjectInit(String),

    /// Object has not been initialized
    #[error("renderer object {0:?} is not initialized")]
    ObjectNotInitialized(ObjectKey),

    /// Called from a thread other than the registered one
    #[error("called from outside the {0} thread")]
    WrongThread(ThreadRole),

    /// Device back-end failure
    #[error("back-end error: {0}")]
    Backend(String),
}

/// The renderers fed by the output traversal
#[derive(Debug)]
pub struct Renderers {
    /// Video renderer
    pub video: VideoRenderer,
    /// Audio renderer
    pub audio: AudioRenderer,
    /// Physics simulator
    pub physics: PhysicsSimulator,
}

impl Default for Renderers {
    fn default() -> Self {
        Self::new(&RendererConfig::default())
    }
}

impl Renderers {
    /// Renderers with null back-ends
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            video: Renderer::new("video", config),
            audio: Renderer::new("audio", config),
            physics: Renderer::new("physics", config),
        }
    }

    /// Replace the video back-end; only before `init_all`
    pub fn with_video_backend(mut self, backend: Box<dyn Backend<CameraView, DrawItem>>) -> Result<Self, RenderError> {
        self.video.set_backend(backend)?;
        Ok(self)
    }

    /// Replace the audio back-end; only before `init_all`
    pub fn with_audio_backend(
        mut self,
        backend: Box<dyn Backend<ListenerState, PlayItem>>,
    ) -> Result<Self, RenderError> {
        self.audio.set_backend(backend)?;
        Ok(self)
    }

    /// Replace the physics back-end; only before `init_all`
    pub fn with_physics_backend(
        mut self,
        backend: Box<dyn Backend<IslandState, SimulationItem>>,
    ) -> Result<Self, RenderError> {
        self.physics.set_backend(backend)?;
        Ok(self)
    }

    pub(crate) fn apply_config(&mut self, config: &RendererConfig) {
        self.video.apply_config(config);
        self.audio.apply_config(config);
        self.physics.apply_config(config);
    }

    /// Whether every renderer is initialized
    pub fn is_initialized(&self) -> bool {
        self.video.is_initialized() && self.audio.is_initialized() && self.physics.is_initialized()
    }

    /// Initialize every renderer; already initialized ones are skipped
    pub fn init_all(&mut self) -> Result<(), RenderError> {
        if !self.video.is_initialized() {
            self.video.init()?;
        }
        if !self.audio.is_initialized() {
            self.audio.init()?;
        }
        if !self.physics.is_initialized() {
            self.physics.init()?;
        }
        Ok(())
    }

    /// Release every renderer
    pub fn deinit_all(&mut self) -> Result<(), RenderError> {
        self.physics.deinit()?;
        self.audio.deinit()?;
        self.video.deinit()
    }

    /// Open a submission on every renderer
    ///
    /// Either all three submissions are opened or none is: when one renderer
    /// refuses, the submissions already opened are aborted.
    pub fn begin_submission_all(&mut self) -> Result<(), RenderError> {
        self.video.begin_submission()?;
        if let Err(error) = self.audio.begin_submission() {
            self.video.abort_submission();
            return Err(error);
        }
        if let Err(error) = self.physics.begin_submission() {
            self.video.abort_submission();
            self.audio.abort_submission();
            return Err(error);
        }
        Ok(())
    }

    /// Close the submission on every renderer
    ///
    /// Every renderer is closed even when one fails; the first error is
    /// returned.
    pub fn end_submission_all(&mut self) -> Result<(), RenderError> {
        let results = [
            self.video.end_submission().inspect_err(|_| self.video.abort_submission()),
            self.audio.end_submission().inspect_err(|_| self.audio.abort_submission()),
            self.physics.end_submission().inspect_err(|_| self.physics.abort_submission()),
        ];
        results.into_iter().collect()
    }

    /// Render the latest batch on every renderer
    ///
    /// A back-end failure aborts that renderer's cycle without stopping the
    /// others; the first error is returned. Returns the number of objects
    /// suspended.
    pub fn begin_rendering_all(&mut self, trigger_suspend: bool) -> Result<usize, RenderError> {
        let results = [
            self.video.begin_rendering(trigger_suspend).inspect_err(|_| self.video.abort_rendering()),
            self.audio.begin_rendering(trigger_suspend).inspect_err(|_| self.audio.abort_rendering()),
            self.physics.begin_rendering(trigger_suspend).inspect_err(|_| self.physics.abort_rendering()),
        ];
        let mut suspended = 0;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(count) => suspended += count,
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }
        first_error.map_or(Ok(suspended), Err)
    }

    /// Finish the render cycle on every renderer
    pub fn end_rendering_all(&mut self) -> Result<(), RenderError> {
        for renderer_result in [
            Self::end_if_rendering(&mut self.video),
            Self::end_if_rendering(&mut self.audio),
            Self::end_if_rendering(&mut self.physics),
        ] {
            renderer_result?;
        }
        Ok(())
    }

    fn end_if_rendering<C, I>(renderer: &mut Renderer<C, I>) -> Result<(), RenderError> {
        if renderer.state() == SubmissionState::Rendering {
            renderer.end_rendering()
        } else {
            Ok(())
        }
    }

    /// Suspend every device
    pub fn suspend_devices(&mut self) -> Result<(), RenderError> {
        self.video.suspend_device()?;
        self.audio.suspend_device()?;
        self.physics.suspend_device()
    }

    /// Resume every device
    pub fn resume_devices(&mut self) -> Result<(), RenderError> {
        self.video.resume_device()?;
        self.audio.resume_device()?;
        self.physics.resume_device()
    }

    /// Combined statistics
    pub fn stats(&self) -> RenderStats {
        let (video, audio, physics) = (self.video.stats(), self.audio.stats(), self.physics.stats());
        RenderStats {
            allocated_bytes: video.allocated_bytes + audio.allocated_bytes + physics.allocated_bytes,
            suspended_objects: video.suspended_objects + audio.suspended_objects + physics.suspended_objects,
            pushed_objects: video.pushed_objects + audio.pushed_objects + physics.pushed_objects,
            frames: video.frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::NodeKey;
    use crate::foundation::math::Transform;

    fn config(automatic: bool, after: u64) -> RendererConfig {
        RendererConfig {
            automatic_suspension: automatic,
            suspend_after_frames: after,
            ..RendererConfig::default()
        }
    }

    fn video(config: &RendererConfig) -> (VideoRenderer, RecordingLog<CameraView, DrawItem>) {
        let backend = RecordingBackend::new();
        let log = backend.log();
        let mut renderer = VideoRenderer::with_backend("video", config, Box::new(backend));
        renderer.init().unwrap();
        (renderer, log)
    }

    fn object(renderer: &mut VideoRenderer, bytes: u64, policy: SuspensionPolicy) -> ObjectKey {
        renderer
            .register_object(Box::new(ResourceObject::new("mesh", bytes)), policy)
            .unwrap()
    }

    fn cycle(renderer: &mut VideoRenderer, pushed: &[ObjectKey], trigger: bool) -> usize {
        renderer.begin_submission().unwrap();
        for &object in pushed {
            renderer
                .push_object_for_rendering(DrawItem {
                    object,
                    transform: Transform::identity(),
                })
                .unwrap();
        }
        renderer.end_submission().unwrap();
        let suspended = renderer.begin_rendering(trigger).unwrap();
        renderer.end_rendering().unwrap();
        suspended
    }

    #[test]
    fn test_push_outside_submission_rejected() {
        let (mut renderer, _) = video(&config(false, 1));
        let key = object(&mut renderer, 16, SuspensionPolicy::Never);
        let item = DrawItem {
            object: key,
            transform: Transform::identity(),
        };
        assert_eq!(
            renderer.push_object_for_rendering(item.clone()),
            Err(RenderError::NotSubmitting(SubmissionState::Ready))
        );
        renderer.begin_submission().unwrap();
        renderer.end_submission().unwrap();
        assert_eq!(
            renderer.push_object_for_rendering(item),
            Err(RenderError::NotSubmitting(SubmissionState::Submitted))
        );
        assert_eq!(renderer.stats().pushed_objects, 0);
    }

    #[test]
    fn test_backend_sees_submitted_batch() {
        let (mut renderer, log) = video(&config(false, 1));
        let key = object(&mut renderer, 16, SuspensionPolicy::Never);
        renderer.begin_submission().unwrap();
        renderer
            .set_current_camera(CameraView {
                camera: NodeKey::default(),
                transform: Transform::identity(),
                field_of_view: 1.0,
            })
            .unwrap();
        renderer
            .push_object_for_rendering(DrawItem {
                object: key,
                transform: Transform::identity(),
            })
            .unwrap();
        renderer.end_submission().unwrap();
        renderer.begin_rendering(false).unwrap();
        renderer.end_rendering().unwrap();

        let batch = log.last().unwrap();
        assert_eq!(batch.items.len(), 1);
        assert!(batch.current.is_some());
        assert_eq!(renderer.frame(), 1);
        assert_eq!(renderer.stats().frames, 1);
    }

    #[test]
    fn test_automatic_object_suspended_and_resumed() {
        let (mut renderer, _) = video(&config(true, 1));
        let key = object(&mut renderer, 64, SuspensionPolicy::Automatic);
        assert_eq!(renderer.stats().allocated_bytes, 64);

        assert_eq!(cycle(&mut renderer, &[key], false), 0);
        assert_eq!(cycle(&mut renderer, &[key], false), 0);
        assert_eq!(cycle(&mut renderer, &[], false), 1);
        assert_eq!(renderer.object_state(key), Some(ObjectState::Suspended));
        assert_eq!(renderer.stats().allocated_bytes, 0);
        assert_eq!(renderer.stats().suspended_objects, 1);

        cycle(&mut renderer, &[key], false);
        assert_eq!(renderer.object_state(key), Some(ObjectState::Initialized));
        assert_eq!(renderer.stats().allocated_bytes, 64);
        assert_eq!(renderer.stats().suspended_objects, 0);
    }

    #[test]
    fn test_manual_object_suspended_only_on_trigger() {
        let (mut renderer, _) = video(&config(true, 1));
        let manual = object(&mut renderer, 8, SuspensionPolicy::Manual);
        let kept = object(&mut renderer, 8, SuspensionPolicy::Manual);

        for _ in 0..4 {
            cycle(&mut renderer, &[kept], false);
        }
        assert_eq!(renderer.object_state(manual), Some(ObjectState::Initialized));

        assert_eq!(cycle(&mut renderer, &[kept], true), 1);
        assert_eq!(renderer.object_state(manual), Some(ObjectState::Suspended));
        assert_eq!(renderer.object_state(kept), Some(ObjectState::Initialized));
    }

    #[test]
    fn test_never_policy_survives_sweeps() {
        let (mut renderer, _) = video(&config(true, 1));
        let key = object(&mut renderer, 8, SuspensionPolicy::Never);
        for _ in 0..3 {
            cycle(&mut renderer, &[], true);
        }
        assert_eq!(renderer.object_state(key), Some(ObjectState::Initialized));
    }

    #[test]
    fn test_paused_renderer_skips_backend() {
        let (mut renderer, log) = video(&config(false, 1));
        renderer.pause();
        cycle(&mut renderer, &[], false);
        assert!(log.is_empty());
        renderer.resume();
        cycle(&mut renderer, &[], false);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_failing_backend_aborts_cycle() {
        let mut renderers = Renderers::default()
            .with_video_backend(Box::new(RecordingBackend::failing()))
            .unwrap();
        renderers.init_all().unwrap();
        renderers.begin_submission_all().unwrap();
        renderers.end_submission_all().unwrap();
        assert!(matches!(renderers.begin_rendering_all(false), Err(RenderError::Backend(_))));
        renderers.end_rendering_all().unwrap();
        assert_eq!(renderers.audio.frame(), 1);
        renderers.begin_submission_all().unwrap();
    }

    #[test]
    fn test_refused_submission_aborts_opened_renderers() {
        let mut renderers = Renderers::default();
        renderers.init_all().unwrap();
        renderers.physics.stop().unwrap();

        assert_eq!(
            renderers.begin_submission_all(),
            Err(RenderError::WrongState {
                expected: SubmissionState::Ready,
                actual: SubmissionState::Uninitialized,
            })
        );
        assert_eq!(renderers.video.state(), SubmissionState::Ready);
        assert_eq!(renderers.audio.state(), SubmissionState::Ready);

        renderers.physics.init().unwrap();
        renderers.begin_submission_all().unwrap();
        renderers.end_submission_all().unwrap();
        renderers.begin_rendering_all(false).unwrap();
        renderers.end_rendering_all().unwrap();
        assert_eq!(renderers.video.frame(), 1);
        assert_eq!(renderers.physics.frame(), 1);
    }

    #[test]
    fn test_end_submission_closes_every_renderer() {
        let mut renderers = Renderers::default();
        renderers.init_all().unwrap();
        renderers.begin_submission_all().unwrap();
        renderers.audio.stop().unwrap();

        assert!(renderers.end_submission_all().is_err());
        assert_eq!(renderers.video.state(), SubmissionState::Submitted);
        assert_eq!(renderers.physics.state(), SubmissionState::Submitted);
    }

    #[test]
    fn test_stop_keeps_objects_registered() {
        let (mut renderer, _) = video(&config(false, 1));
        let key = object(&mut renderer, 32, SuspensionPolicy::Automatic);
        renderer.stop().unwrap();
        assert!(!renderer.is_initialized());
        assert_eq!(renderer.object_state(key), Some(ObjectState::Suspended));
        assert_eq!(renderer.stats().allocated_bytes, 0);
    }
}
