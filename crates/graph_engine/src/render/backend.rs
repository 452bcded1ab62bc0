//! Renderer back-end abstraction
//!
//! Concrete device back-ends (GPU, audio device, physics solver) live
//! outside this crate. The core only drives them through [`Backend`].

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Result type for backend operations
pub type BackendResult<T> = Result<T, String>;

/// Device back-end of a renderer
#[allow(unused_variables)]
pub trait Backend<C, I>: Send {
    /// Back-end name for diagnostics
    fn name(&self) -> &str;

    /// Acquire the device
    fn init(&mut self) -> BackendResult<()> {
        Ok(())
    }

    /// Release the device
    fn deinit(&mut self) {}

    /// Consume one submitted batch
    fn render(&mut self, current: Option<&C>, batch: &[I]) -> BackendResult<()>;

    /// Playback paused
    fn pause(&mut self) {}

    /// Playback resumed
    fn resume(&mut self) {}

    /// Release device resources while keeping logical state
    fn suspend_device(&mut self) {}

    /// Reacquire device resources
    fn resume_device(&mut self) -> BackendResult<()> {
        Ok(())
    }
}

/// Back-end that accepts and discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl<C, I> Backend<C, I> for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn render(&mut self, _current: Option<&C>, _batch: &[I]) -> BackendResult<()> {
        Ok(())
    }
}

/// One batch seen by a [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedBatch<C, I> {
    /// Context current when the batch was rendered
    pub current: Option<C>,
    /// Items of the batch
    pub items: Vec<I>,
}

/// Shared view of the batches recorded by a [`RecordingBackend`]
pub struct RecordingLog<C, I> {
    batches: Arc<Mutex<Vec<RecordedBatch<C, I>>>>,
}

impl<C, I> Clone for RecordingLog<C, I> {
    fn clone(&self) -> Self {
        Self {
            batches: Arc::clone(&self.batches),
        }
    }
}

impl<C: Clone, I: Clone> RecordingLog<C, I> {
    /// Copy of every recorded batch, oldest first
    pub fn batches(&self) -> Vec<RecordedBatch<C, I>> {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of recorded batches
    pub fn len(&self) -> usize {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent batch
    pub fn last(&self) -> Option<RecordedBatch<C, I>> {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }
}

impl<C, I> fmt::Debug for RecordingLog<C, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingLog").finish_non_exhaustive()
    }
}

/// Conformance test double recording every rendered batch
pub struct RecordingBackend<C, I> {
    log: RecordingLog<C, I>,
    fail_render: bool,
}

impl<C, I> Default for RecordingBackend<C, I> {
    fn default() -> Self {
        Self {
            log: RecordingLog {
                batches: Arc::new(Mutex::new(Vec::new())),
            },
            fail_render: false,
        }
    }
}

impl<C, I> RecordingBackend<C, I> {
    /// Create a recording back-end
    pub fn new() -> Self {
        Self::default()
    }

    /// A back-end whose `render` always fails
    pub fn failing() -> Self {
        Self {
            fail_render: true,
            ..Self::default()
        }
    }

    /// Handle to the recorded batches, valid after the back-end is boxed
    pub fn log(&self) -> RecordingLog<C, I> {
        self.log.clone()
    }
}

impl<C: Clone + Send, I: Clone + Send> Backend<C, I> for RecordingBackend<C, I> {
    fn name(&self) -> &str {
        "recording"
    }

    fn render(&mut self, current: Option<&C>, batch: &[I]) -> BackendResult<()> {
        if self.fail_render {
            return Err("recording back-end configured to fail".to_string());
        }
        self.log
            .batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedBatch {
                current: current.cloned(),
                items: batch.to_vec(),
            });
        Ok(())
    }
}
