//! Traversal trackers
//!
//! One tracker object is created per traversal and handed to every hook that
//! runs during it. Trackers carry the traversal-scoped state: the trigger
//! mask, the node currently visited, the user data stacks, and the
//! diagnostics collected along the way.

pub mod user_data;

use std::any::Any;
use std::fmt;

use bitflags::bitflags;

use crate::foundation::collections::{Key, NodeKey};
use crate::graph::PropertyValue;

pub use user_data::{UserDataId, UserDataStack};

bitflags! {
    /// Trigger / response mask of a traversal
    ///
    /// A controller hook runs only if the controller's response mask for the
    /// traversal kind intersects the traversal's trigger mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TraversalMask: u32 {
        /// The group every controller responds to unless told otherwise
        const DEFAULT = 1;
        const _ = !0;
    }
}

impl TraversalMask {
    /// Mask with a single group bit set (`group` is taken modulo 32)
    pub fn group(group: u32) -> Self {
        Self::from_bits_retain(1 << (group % 32))
    }
}

impl Default for TraversalMask {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Kind of traversal a tracker belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerKind {
    /// Subtree initialization
    Init,
    /// Subtree de-initialization
    DeInit,
    /// Configuration change broadcast
    ConfigChanged,
    /// Per-frame logic
    Logic,
    /// Per-frame input
    Input,
    /// Per-frame output submission
    Output,
}

/// Severity of a tracker diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational
    Info,
    /// Something odd that did not fail the traversal
    Warning,
    /// The node failed; Init/DeInit report overall failure
    Error,
}

/// A diagnostic message recorded during a traversal
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerResult {
    /// Traversal the message came from
    pub kind: TrackerKind,
    /// Severity
    pub severity: Severity,
    /// Node being visited when the message was recorded
    pub node: NodeKey,
    /// Identifier of that node (may be empty)
    pub node_id: String,
    /// Human readable message
    pub message: String,
}

impl fmt::Display for TrackerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = if self.node_id.is_empty() { "<unnamed>" } else { &self.node_id };
        write!(f, "[{:?}/{:?}] {}: {}", self.kind, self.severity, id, self.message)
    }
}

/// Frame timing handed to logic traversals
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTime {
    /// Accumulated logic time in seconds
    pub current: f64,
    /// Seconds since the previous logic step
    pub delta: f64,
    /// Logic step counter
    pub frame: u64,
}

/// A timeline broadcast to time controllers below it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineSample {
    /// Timeline node that produced the sample
    pub source: NodeKey,
    /// Timeline unit index (0..32)
    pub unit: u32,
    /// Trigger group mask of the timeline
    pub group_mask: u32,
    /// Clip index
    pub clip: usize,
    /// Current clip time in seconds
    pub time: f64,
    /// Raw blend weight
    pub weight: f64,
}

/// A platform-agnostic input event routed through input traversals
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    /// Event name (e.g. `"key.space"`)
    pub name: String,
    /// Payload
    pub value: PropertyValue,
}

impl InputEvent {
    /// Create an input event
    pub fn new(name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// State shared by every tracker kind
#[derive(Debug)]
pub struct TrackerCore {
    kind: TrackerKind,
    trigger: TraversalMask,
    results: Vec<TrackerResult>,
    user_data: UserDataStack,
    current: NodeKey,
    current_id: String,
    depth: usize,
    finish_cancelled: bool,
    errors: usize,
}

impl TrackerCore {
    pub(crate) fn new(kind: TrackerKind, trigger: TraversalMask, user_data: UserDataStack) -> Self {
        Self {
            kind,
            trigger,
            results: Vec::new(),
            user_data,
            current: NodeKey::null(),
            current_id: String::new(),
            depth: 0,
            finish_cancelled: false,
            errors: 0,
        }
    }

    /// Set the node being visited, returning the previous one
    pub(crate) fn enter(&mut self, node: NodeKey, id: &str) -> (NodeKey, String) {
        self.depth += 1;
        let previous_id = std::mem::replace(&mut self.current_id, id.to_string());
        (std::mem::replace(&mut self.current, node), previous_id)
    }

    pub(crate) fn leave(&mut self, previous: (NodeKey, String)) {
        self.depth = self.depth.saturating_sub(1);
        self.current = previous.0;
        self.current_id = previous.1;
    }

    pub(crate) fn error_count(&self) -> usize {
        self.errors
    }

    pub(crate) fn reset_finish(&mut self) {
        self.finish_cancelled = false;
    }

    pub(crate) fn finish_cancelled(&self) -> bool {
        self.finish_cancelled
    }

    /// Split the tracker back into its results and user data
    pub(crate) fn finish(self) -> (Vec<TrackerResult>, UserDataStack) {
        (self.results, self.user_data)
    }
}

/// Common tracker interface
pub trait Tracker {
    /// Shared tracker state
    fn core(&self) -> &TrackerCore;

    /// Mutable shared tracker state
    fn core_mut(&mut self) -> &mut TrackerCore;

    /// Traversal kind
    fn kind(&self) -> TrackerKind {
        self.core().kind
    }

    /// Trigger mask of this traversal
    fn trigger_mask(&self) -> TraversalMask {
        self.core().trigger
    }

    /// Node currently visited
    fn current_node(&self) -> NodeKey {
        self.core().current
    }

    /// Depth of the node currently visited (the start node is depth 1)
    fn depth(&self) -> usize {
        self.core().depth
    }

    /// Record a diagnostic for the current node
    fn add_result(&mut self, severity: Severity, message: impl Into<String>) {
        let core = self.core_mut();
        let result = TrackerResult {
            kind: core.kind,
            severity,
            node: core.current,
            node_id: core.current_id.clone(),
            message: message.into(),
        };
        match severity {
            Severity::Error => {
                core.errors += 1;
                log::warn!("{result}");
            }
            Severity::Warning => log::debug!("{result}"),
            Severity::Info => log::trace!("{result}"),
        }
        core.results.push(result);
    }

    /// Record an error; Init/DeInit traversals report failure
    fn add_error(&mut self, message: impl Into<String>) {
        self.add_result(Severity::Error, message);
    }

    /// Record a warning
    fn add_warning(&mut self, message: impl Into<String>) {
        self.add_result(Severity::Warning, message);
    }

    /// Diagnostics recorded so far
    fn results(&self) -> &[TrackerResult] {
        &self.core().results
    }

    /// Push user data under an acquired id
    fn push_user_data<T: Any + Send>(&mut self, id: UserDataId, value: T) -> bool {
        self.core_mut().user_data.push(id, Box::new(value))
    }

    /// Pop user data
    fn pop_user_data(&mut self, id: UserDataId) -> Option<Box<dyn Any + Send>> {
        self.core_mut().user_data.pop(id)
    }

    /// Most recent user data under an id, as `T`
    fn top_user_data<T: Any>(&self, id: UserDataId) -> Option<&T> {
        self.core().user_data.top::<T>(id)
    }
}

macro_rules! impl_tracker {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Tracker for $ty {
                fn core(&self) -> &TrackerCore {
                    &self.core
                }

                fn core_mut(&mut self) -> &mut TrackerCore {
                    &mut self.core
                }
            }

            impl $ty {
                pub(crate) fn into_core(self) -> TrackerCore {
                    self.core
                }
            }
        )*
    };
}

/// Tracker for Init traversals
#[derive(Debug)]
pub struct InitTracker {
    core: TrackerCore,
}

impl InitTracker {
    pub(crate) fn new(user_data: UserDataStack) -> Self {
        Self {
            core: TrackerCore::new(TrackerKind::Init, TraversalMask::all(), user_data),
        }
    }
}

/// Tracker for DeInit traversals
#[derive(Debug)]
pub struct DeInitTracker {
    core: TrackerCore,
}

impl DeInitTracker {
    pub(crate) fn new(user_data: UserDataStack) -> Self {
        Self {
            core: TrackerCore::new(TrackerKind::DeInit, TraversalMask::all(), user_data),
        }
    }
}

/// Tracker for config-changed traversals
#[derive(Debug)]
pub struct ConfigChangedTracker {
    core: TrackerCore,
}

impl ConfigChangedTracker {
    pub(crate) fn new(trigger: TraversalMask, user_data: UserDataStack) -> Self {
        Self {
            core: TrackerCore::new(TrackerKind::ConfigChanged, trigger, user_data),
        }
    }
}

/// Tracker for logic traversals
#[derive(Debug)]
pub struct LogicTracker {
    core: TrackerCore,
    time: FrameTime,
    timelines: Vec<TimelineSample>,
}

impl LogicTracker {
    pub(crate) fn new(time: FrameTime, trigger: TraversalMask, user_data: UserDataStack) -> Self {
        Self {
            core: TrackerCore::new(TrackerKind::Logic, trigger, user_data),
            time,
            timelines: Vec::new(),
        }
    }

    /// Frame timing of this step
    pub fn time(&self) -> FrameTime {
        self.time
    }

    /// Make a timeline visible to the current subtree
    ///
    /// Timelines pushed while visiting a node are popped automatically once
    /// that node's subtree is done.
    pub fn push_timeline(&mut self, sample: TimelineSample) {
        self.timelines.push(sample);
    }

    /// Withdraw the most recently pushed timeline before its subtree ends
    pub fn pop_timeline(&mut self) -> Option<TimelineSample> {
        self.timelines.pop()
    }

    /// Timelines currently in scope, outermost first
    pub fn active_timelines(&self) -> &[TimelineSample] {
        &self.timelines
    }

    /// Skip the finish phase (node finish hook and controller Post hooks)
    /// of the node currently visited
    pub fn cancel_finish(&mut self) {
        self.core.finish_cancelled = true;
    }

    pub(crate) fn timeline_depth(&self) -> usize {
        self.timelines.len()
    }

    pub(crate) fn truncate_timelines(&mut self, depth: usize) {
        self.timelines.truncate(depth);
    }
}

/// Tracker for input traversals
#[derive(Debug)]
pub struct InputTracker {
    core: TrackerCore,
    events: Vec<InputEvent>,
}

impl InputTracker {
    pub(crate) fn new(events: Vec<InputEvent>, trigger: TraversalMask, user_data: UserDataStack) -> Self {
        Self {
            core: TrackerCore::new(TrackerKind::Input, trigger, user_data),
            events,
        }
    }

    /// Events not yet consumed
    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    /// Remove and return the first event with the given name
    pub fn consume(&mut self, name: &str) -> Option<InputEvent> {
        let index = self.events.iter().position(|event| event.name == name)?;
        Some(self.events.remove(index))
    }

    /// Skip the finish phase of the node currently visited
    pub fn cancel_finish(&mut self) {
        self.core.finish_cancelled = true;
    }

    pub(crate) fn into_remaining(self) -> (TrackerCore, Vec<InputEvent>) {
        (self.core, self.events)
    }
}

/// Tracker for output traversals
#[derive(Debug)]
pub struct OutputTracker {
    core: TrackerCore,
    frame: u64,
    pushed: usize,
}

impl OutputTracker {
    pub(crate) fn new(frame: u64, trigger: TraversalMask, user_data: UserDataStack) -> Self {
        Self {
            core: TrackerCore::new(TrackerKind::Output, trigger, user_data),
            frame,
            pushed: 0,
        }
    }

    /// Frame number being submitted
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Count a successful push into a renderer
    pub fn record_push(&mut self) {
        self.pushed += 1;
    }

    /// Objects pushed during this traversal
    pub fn pushed(&self) -> usize {
        self.pushed
    }

    /// Skip the finish phase of the node currently visited
    pub fn cancel_finish(&mut self) {
        self.core.finish_cancelled = true;
    }
}

impl_tracker!(InitTracker, DeInitTracker, ConfigChangedTracker, LogicTracker, InputTracker, OutputTracker);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_mask() {
        assert_eq!(TraversalMask::group(0), TraversalMask::DEFAULT);
        assert_eq!(TraversalMask::group(1).bits(), 0x2);
        assert!(!TraversalMask::group(1).intersects(TraversalMask::DEFAULT));
        assert!(TraversalMask::all().contains(TraversalMask::group(31)));
    }

    #[test]
    fn test_results_count_errors() {
        let mut tracker = InitTracker::new(UserDataStack::new());
        tracker.add_warning("odd");
        tracker.add_error("broken");
        assert_eq!(tracker.results().len(), 2);
        assert_eq!(tracker.core().error_count(), 1);
        assert_eq!(tracker.results()[1].severity, Severity::Error);
    }

    #[test]
    fn test_enter_leave_restores_current() {
        let mut tracker = InitTracker::new(UserDataStack::new());
        let outer = tracker.core_mut().enter(NodeKey::null(), "outer");
        assert_eq!(tracker.depth(), 1);
        tracker.add_error("x");
        assert_eq!(tracker.results()[0].node_id, "outer");
        tracker.core_mut().leave(outer);
        assert_eq!(tracker.depth(), 0);
    }

    #[test]
    fn test_timeline_scope() {
        let mut tracker = LogicTracker::new(FrameTime::default(), TraversalMask::DEFAULT, UserDataStack::new());
        let sample = TimelineSample {
            source: NodeKey::null(),
            unit: 0,
            group_mask: 1,
            clip: 0,
            time: 0.5,
            weight: 1.0,
        };
        let scope = tracker.timeline_depth();
        tracker.push_timeline(sample);
        tracker.push_timeline(TimelineSample { clip: 1, ..sample });
        assert_eq!(tracker.pop_timeline().map(|popped| popped.clip), Some(1));
        assert_eq!(tracker.active_timelines().len(), 1);
        tracker.truncate_timelines(scope);
        assert!(tracker.active_timelines().is_empty());
    }

    #[test]
    fn test_input_consume() {
        let mut tracker = InputTracker::new(
            vec![InputEvent::new("a", 1.0), InputEvent::new("b", true)],
            TraversalMask::all(),
            UserDataStack::new(),
        );
        assert!(tracker.consume("b").is_some());
        assert!(tracker.consume("b").is_none());
        assert_eq!(tracker.events().len(), 1);
    }
}
