//! Submission protocol state machine
//!
//! Shared by the video, audio and physics renderers:
//!
//! ```text
//! Uninitialized --init--> Ready
//! Ready --begin_submission--> Submitting --(set_current | push)*--> Submitting
//! Submitting --end_submission--> Submitted
//! Submitted | Ready --begin_rendering--> Rendering --end_rendering--> Ready
//! ```
//!
//! Items are double buffered: pushes fill the pending queue while the
//! previously submitted batch stays available to the renderer.

use std::fmt;
use std::mem;

use crate::render::RenderError;

/// Protocol state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionState {
    /// Not initialized
    Uninitialized,
    /// Between cycles
    Ready,
    /// Inside Begin/EndSubmission
    Submitting,
    /// A batch is waiting to be rendered
    Submitted,
    /// Inside Begin/EndRendering
    Rendering,
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Current context and double-buffered item queues
#[derive(Debug)]
pub struct SubmissionCore<C, I> {
    state: SubmissionState,
    current: Option<C>,
    pending: Vec<I>,
    submitted: Vec<I>,
    frame: u64,
}

impl<C, I> Default for SubmissionCore<C, I> {
    fn default() -> Self {
        Self {
            state: SubmissionState::Uninitialized,
            current: None,
            pending: Vec::new(),
            submitted: Vec::new(),
            frame: 0,
        }
    }
}

impl<C, I> SubmissionCore<C, I> {
    /// Uninitialized core
    pub fn new() -> Self {
        Self::default()
    }

    /// Protocol state
    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// Render cycle counter; pushes are stamped with it
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Context set during the latest submission
    pub fn current(&self) -> Option<&C> {
        self.current.as_ref()
    }

    /// Items of the latest completed submission
    pub fn submitted(&self) -> &[I] {
        &self.submitted
    }

    /// Items pushed so far in the open submission
    pub fn pending(&self) -> &[I] {
        &self.pending
    }

    fn expect(&self, expected: SubmissionState) -> Result<(), RenderError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RenderError::WrongState {
                expected,
                actual: self.state,
            })
        }
    }

    /// Uninitialized -> Ready
    pub fn init(&mut self) -> Result<(), RenderError> {
        self.expect(SubmissionState::Uninitialized)?;
        self.state = SubmissionState::Ready;
        Ok(())
    }

    /// Any state -> Uninitialized, dropping queued items
    pub fn reset(&mut self) {
        self.state = SubmissionState::Uninitialized;
        self.current = None;
        self.pending.clear();
        self.submitted.clear();
    }

    /// Ready -> Submitting
    pub fn begin_submission(&mut self) -> Result<(), RenderError> {
        self.expect(SubmissionState::Ready)?;
        self.pending.clear();
        self.current = None;
        self.state = SubmissionState::Submitting;
        Ok(())
    }

    /// Submitting -> Ready, discarding the open submission
    ///
    /// The previously submitted batch is kept. Returns whether a submission
    /// was open.
    pub fn abort_submission(&mut self) -> bool {
        if self.state != SubmissionState::Submitting {
            return false;
        }
        self.pending.clear();
        self.current = None;
        self.state = SubmissionState::Ready;
        true
    }

    /// Set the current context; only legal while submitting
    pub fn set_current(&mut self, current: C) -> Result<(), RenderError> {
        self.check_submitting()?;
        self.current = Some(current);
        Ok(())
    }

    /// Queue an item; only legal while submitting
    pub fn push(&mut self, item: I) -> Result<(), RenderError> {
        self.check_submitting()?;
        self.pending.push(item);
        Ok(())
    }

    /// Fails with [`RenderError::NotSubmitting`] outside Begin/EndSubmission
    pub fn check_submitting(&self) -> Result<(), RenderError> {
        if self.state == SubmissionState::Submitting {
            Ok(())
        } else {
            Err(RenderError::NotSubmitting(self.state))
        }
    }

    /// Submitting -> Submitted, publishing the pending queue
    pub fn end_submission(&mut self) -> Result<(), RenderError> {
        self.expect(SubmissionState::Submitting)?;
        self.submitted = mem::take(&mut self.pending);
        self.state = SubmissionState::Submitted;
        Ok(())
    }

    /// Submitted or Ready -> Rendering
    ///
    /// Starting from Ready re-renders the previous batch.
    pub fn begin_rendering(&mut self) -> Result<(), RenderError> {
        match self.state {
            SubmissionState::Submitted | SubmissionState::Ready => {
                self.state = SubmissionState::Rendering;
                Ok(())
            }
            actual => Err(RenderError::WrongState {
                expected: SubmissionState::Submitted,
                actual,
            }),
        }
    }

    /// Rendering -> Ready, completing the cycle
    pub fn end_rendering(&mut self) -> Result<(), RenderError> {
        self.expect(SubmissionState::Rendering)?;
        self.frame += 1;
        self.state = SubmissionState::Ready;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_cycle_publishes_batch() {
        let mut core = SubmissionCore::<&str, u32>::new();
        core.init().unwrap();
        core.begin_submission().unwrap();
        core.set_current("camera").unwrap();
        core.push(1).unwrap();
        core.push(2).unwrap();
        assert!(core.submitted().is_empty());
        core.end_submission().unwrap();
        assert_eq!(core.submitted(), &[1, 2]);
        core.begin_rendering().unwrap();
        core.end_rendering().unwrap();
        assert_eq!(core.frame(), 1);
        assert_eq!(core.state(), SubmissionState::Ready);
        assert_eq!(core.current(), Some(&"camera"));
    }

    #[test]
    fn test_push_outside_submission_fails() {
        let mut core = SubmissionCore::<(), u32>::new();
        assert_eq!(core.push(1), Err(RenderError::NotSubmitting(SubmissionState::Uninitialized)));
        core.init().unwrap();
        assert_eq!(core.push(1), Err(RenderError::NotSubmitting(SubmissionState::Ready)));
        core.begin_submission().unwrap();
        core.end_submission().unwrap();
        assert!(core.set_current(()).is_err());
        assert!(core.push(1).is_err());
    }

    #[test]
    fn test_out_of_order_calls_rejected() {
        let mut core = SubmissionCore::<(), u32>::new();
        assert!(core.begin_submission().is_err());
        core.init().unwrap();
        assert!(core.end_submission().is_err());
        assert!(core.end_rendering().is_err());
        core.begin_submission().unwrap();
        assert!(core.begin_rendering().is_err());
    }

    #[test]
    fn test_abort_keeps_previous_batch() {
        let mut core = SubmissionCore::<(), u32>::new();
        core.init().unwrap();
        assert!(!core.abort_submission());
        core.begin_submission().unwrap();
        core.push(7).unwrap();
        core.end_submission().unwrap();
        core.begin_rendering().unwrap();
        core.end_rendering().unwrap();

        core.begin_submission().unwrap();
        core.push(8).unwrap();
        assert!(core.abort_submission());
        assert_eq!(core.state(), SubmissionState::Ready);
        assert!(core.pending().is_empty());
        assert_eq!(core.submitted(), &[7]);
        core.begin_submission().unwrap();
    }
}
