//! Generic renderer
//!
//! The video renderer, audio renderer and physics simulator share one shape:
//! a submission protocol, a table of suspendable objects, statistics, thread
//! roles and a device back-end. They differ only in their context type `C`
//! (camera, listener, island) and item type `I`.

use std::fmt;

use crate::core::RendererConfig;
use crate::foundation::collections::ObjectKey;
use crate::render::backend::{Backend, NullBackend};
use crate::render::object::{ObjectState, ObjectTable, RendererObject, SuspensionPolicy};
use crate::render::protocol::{SubmissionCore, SubmissionState};
use crate::render::stats::RenderStats;
use crate::render::threads::{ThreadRole, ThreadRoles};
use crate::render::RenderError;

/// An item that refers to a registered object
pub trait SubmissionItem {
    /// Object the item renders
    fn object(&self) -> ObjectKey;
}

/// Renderer over context `C` and item `I`
pub struct Renderer<C, I> {
    name: &'static str,
    core: SubmissionCore<C, I>,
    objects: ObjectTable,
    stats: RenderStats,
    threads: ThreadRoles,
    config: RendererConfig,
    backend: Box<dyn Backend<C, I>>,
    paused: bool,
    device_suspended: bool,
}

impl<C: 'static, I: 'static> Renderer<C, I> {
    /// Renderer with a [`NullBackend`]
    pub fn new(name: &'static str, config: &RendererConfig) -> Self {
        Self::with_backend(name, config, Box::new(NullBackend))
    }
}

impl<C, I> Renderer<C, I> {
    /// Renderer with an explicit back-end
    pub fn with_backend(name: &'static str, config: &RendererConfig, backend: Box<dyn Backend<C, I>>) -> Self {
        Self {
            name,
            core: SubmissionCore::new(),
            objects: ObjectTable::new(),
            stats: RenderStats::default(),
            threads: ThreadRoles::new(),
            config: config.clone(),
            backend,
            paused: false,
            device_suspended: false,
        }
    }

    /// Swap the back-end; only while uninitialized
    pub fn set_backend(&mut self, backend: Box<dyn Backend<C, I>>) -> Result<(), RenderError> {
        if self.core.state() != SubmissionState::Uninitialized {
            return Err(RenderError::WrongState {
                expected: SubmissionState::Uninitialized,
                actual: self.core.state(),
            });
        }
        self.backend = backend;
        Ok(())
    }

    /// Renderer name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Protocol state
    pub fn state(&self) -> SubmissionState {
        self.core.state()
    }

    /// Whether `init` succeeded and `deinit`/`stop` has not run since
    pub fn is_initialized(&self) -> bool {
        self.core.state() != SubmissionState::Uninitialized
    }

    /// Completed render cycles
    pub fn frame(&self) -> u64 {
        self.core.frame()
    }

    /// Context of the latest submission
    pub fn current(&self) -> Option<&C> {
        self.core.current()
    }

    /// Items of the latest completed submission
    pub fn submitted(&self) -> &[I] {
        self.core.submitted()
    }

    /// Statistics
    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    /// Statistics, for objects managed outside the table
    pub fn stats_mut(&mut self) -> &mut RenderStats {
        &mut self.stats
    }

    /// Thread roles
    pub fn threads(&self) -> &ThreadRoles {
        &self.threads
    }

    /// Whether playback is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the device is suspended
    pub fn is_device_suspended(&self) -> bool {
        self.device_suspended
    }

    pub(crate) fn apply_config(&mut self, config: &RendererConfig) {
        self.config = config.clone();
    }

    // --- Threads ------------------------------------------------------------

    /// Register the calling thread as the render thread
    pub fn register_render_thread(&mut self) {
        self.threads.register_current(ThreadRole::Render);
    }

    /// Register the calling thread as the logic thread
    pub fn register_logic_thread(&mut self) {
        self.threads.register_current(ThreadRole::Logic);
    }

    /// Register the calling thread as the loader thread
    pub fn register_loader_thread(&mut self) {
        self.threads.register_current(ThreadRole::Loader);
    }

    /// Fail if affinity is enforced and the calling thread is not `role`'s
    pub fn check_thread(&self, role: ThreadRole) -> Result<(), RenderError> {
        if !self.config.enforce_thread_affinity || self.threads.is_current(role) {
            Ok(())
        } else {
            Err(RenderError::WrongThread(role))
        }
    }

    // --- Lifecycle ----------------------------------------------------------

    /// Acquire the device
    pub fn init(&mut self) -> Result<(), RenderError> {
        self.check_thread(ThreadRole::Render)?;
        self.core.init()?;
        if let Err(error) = self.backend.init() {
            self.core.reset();
            return Err(RenderError::Backend(error));
        }
        log::info!("{} renderer initialized ({} back-end)", self.name, self.backend.name());
        Ok(())
    }

    /// Release every object and the device
    pub fn deinit(&mut self) -> Result<(), RenderError> {
        self.check_thread(ThreadRole::Render)?;
        self.objects.clear(&mut self.stats);
        self.stop()
    }

    /// Stop: suspend every object, release the device, drop queued items
    ///
    /// Objects stay registered; `init` starts the renderer again.
    pub fn stop(&mut self) -> Result<(), RenderError> {
        if !self.is_initialized() {
            return Ok(());
        }
        let suspended = self.objects.suspend_all(&mut self.stats);
        self.backend.deinit();
        self.core.reset();
        self.paused = false;
        self.device_suspended = false;
        log::info!("{} renderer stopped ({suspended} objects suspended)", self.name);
        Ok(())
    }

    /// Pause playback; submissions are still accepted and kept
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.backend.pause();
            log::debug!("{} renderer paused", self.name);
        }
    }

    /// Resume playback
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.backend.resume();
            log::debug!("{} renderer resumed", self.name);
        }
    }

    /// Release device resources while keeping logical state
    ///
    /// Every object is suspended; pushing an object resumes it once the
    /// device is back.
    pub fn suspend_device(&mut self) -> Result<(), RenderError> {
        self.require_initialized()?;
        if !self.device_suspended {
            let suspended = self.objects.suspend_all(&mut self.stats);
            self.backend.suspend_device();
            self.device_suspended = true;
            log::info!("{} device suspended ({suspended} objects)", self.name);
        }
        Ok(())
    }

    /// Reacquire device resources
    pub fn resume_device(&mut self) -> Result<(), RenderError> {
        self.require_initialized()?;
        if self.device_suspended {
            self.backend.resume_device().map_err(RenderError::Backend)?;
            self.device_suspended = false;
            log::info!("{} device resumed", self.name);
        }
        Ok(())
    }

    fn require_initialized(&self) -> Result<(), RenderError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(RenderError::NotInitialized)
        }
    }

    // --- Objects ------------------------------------------------------------

    /// Initialize and register an object under a suspension policy
    pub fn register_object(
        &mut self,
        object: Box<dyn RendererObject>,
        policy: SuspensionPolicy,
    ) -> Result<ObjectKey, RenderError> {
        if self.check_thread(ThreadRole::Render).is_err() {
            self.check_thread(ThreadRole::Loader)?;
        }
        self.objects.register(object, policy, self.core.frame(), &mut self.stats)
    }

    /// Register an object evicted only by `begin_rendering(true)`
    pub fn register_manually_suspendable_object(
        &mut self,
        object: Box<dyn RendererObject>,
    ) -> Result<ObjectKey, RenderError> {
        self.register_object(object, SuspensionPolicy::Manual)
    }

    /// Register an object evicted when it stops being pushed
    pub fn register_automatically_suspendable_object(
        &mut self,
        object: Box<dyn RendererObject>,
    ) -> Result<ObjectKey, RenderError> {
        self.register_object(object, SuspensionPolicy::Automatic)
    }

    /// De-initialize and remove an object
    pub fn unregister_object(&mut self, key: ObjectKey) -> Result<Box<dyn RendererObject>, RenderError> {
        self.objects.unregister(key, &mut self.stats)
    }

    /// Suspend one object now
    pub fn suspend_object(&mut self, key: ObjectKey) -> Result<bool, RenderError> {
        self.objects.suspend(key, &mut self.stats)
    }

    /// State of an object
    pub fn object_state(&self, key: ObjectKey) -> Option<ObjectState> {
        self.objects.state(key)
    }

    /// Frame in which the object was last pushed
    pub fn recent_frame_count(&self, key: ObjectKey) -> Option<u64> {
        self.objects.recent_frame_count(key)
    }

    /// Registered objects
    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    // --- Submission ---------------------------------------------------------

    /// Open a submission
    pub fn begin_submission(&mut self) -> Result<(), RenderError> {
        self.check_thread(ThreadRole::Logic)?;
        self.core.begin_submission()?;
        self.stats.pushed_objects = 0;
        Ok(())
    }

    /// Set the context (camera, listener, island) of the open submission
    pub fn set_current(&mut self, current: C) -> Result<(), RenderError> {
        self.check_thread(ThreadRole::Logic)?;
        self.core.set_current(current)
    }

    /// Close the submission and publish its batch
    pub fn end_submission(&mut self) -> Result<(), RenderError> {
        self.check_thread(ThreadRole::Logic)?;
        self.core.end_submission()
    }

    /// Start rendering the latest batch
    ///
    /// Runs the suspension sweeps first: with `trigger_suspend` set, manual
    /// objects not in the batch are evicted; automatic objects are evicted
    /// once they went unpushed for the configured number of cycles.
    /// Returns the number of objects suspended by this call.
    pub fn begin_rendering(&mut self, trigger_suspend: bool) -> Result<usize, RenderError> {
        self.check_thread(ThreadRole::Render)?;
        self.core.begin_rendering()?;

        let frame = self.core.frame();
        let mut suspended = 0;
        if trigger_suspend {
            suspended += self.objects.suspend_manual(frame, &mut self.stats);
        }
        if self.config.automatic_suspension {
            suspended += self
                .objects
                .suspend_unused(frame, self.config.suspend_after_frames, &mut self.stats);
        }
        if suspended > 0 {
            log::debug!("{} renderer suspended {suspended} objects in frame {frame}", self.name);
        }

        if self.paused || self.device_suspended {
            return Ok(suspended);
        }
        if let Err(error) = self.backend.render(self.core.current(), self.core.submitted()) {
            log::error!("{} back-end failed to render frame {frame}: {error}", self.name);
            return Err(RenderError::Backend(error));
        }
        Ok(suspended)
    }

    /// Finish the render cycle
    pub fn end_rendering(&mut self) -> Result<(), RenderError> {
        self.check_thread(ThreadRole::Render)?;
        self.core.end_rendering()?;
        self.stats.frames = self.core.frame();
        Ok(())
    }

    /// Drop an open submission when a sibling renderer failed to open its own
    pub(crate) fn abort_submission(&mut self) {
        if self.core.abort_submission() {
            self.stats.pushed_objects = 0;
            log::debug!("{} renderer submission aborted", self.name);
        }
    }

    /// Abort a cycle whose `begin_rendering` failed in the back-end
    pub(crate) fn abort_rendering(&mut self) {
        if self.core.state() == SubmissionState::Rendering {
            if self.core.end_rendering().is_ok() {
                self.stats.frames = self.core.frame();
            }
        }
    }
}

impl<C, I: SubmissionItem> Renderer<C, I> {
    /// Queue an item of the open submission
    ///
    /// Resumes the item's object if it was suspended and stamps it with the
    /// current frame.
    pub fn push(&mut self, item: I) -> Result<(), RenderError> {
        self.check_thread(ThreadRole::Logic)?;
        self.core.check_submitting()?;
        if self.device_suspended {
            return Err(RenderError::DeviceSuspended);
        }
        self.objects.mark_pushed(item.object(), self.core.frame(), &mut self.stats)?;
        self.core.push(item)?;
        self.stats.pushed_objects += 1;
        Ok(())
    }
}

impl<C, I> fmt::Debug for Renderer<C, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("name", &self.name)
            .field("state", &self.core.state())
            .field("objects", &self.objects.len())
            .field("stats", &self.stats)
            .field("paused", &self.paused)
            .finish_non_exhaustive()
    }
}
