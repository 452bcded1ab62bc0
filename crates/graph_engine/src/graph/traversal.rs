//! Config-changed, logic, input and output traversals
//!
//! Every traversal walks depth-first from the root node and, per node, runs
//! controller Pre hooks, the node hook, the children, the node's finish hook
//! and controller Post hooks. A hook may cancel the finish phase of the
//! node being visited. Logic and input skip inactive subtrees, output skips
//! invisible ones. The graph lock is held throughout.

use crate::foundation::collections::{ControllerKey, NodeKey};
use crate::graph::lock::LockMode;
use crate::graph::node::{NodeBehavior, NodeContext, NodeRecord, NodeState};
use crate::graph::{GraphError, Root};
use crate::tracker::{
    ConfigChangedTracker, FrameTime, InputEvent, InputTracker, LogicTracker, OutputTracker, Tracker, TrackerCore,
    TraversalMask,
};

/// One traversal kind
trait Pass {
    type Tracker: Tracker;

    fn participates(record: &NodeRecord) -> bool;

    fn pre(root: &mut Root, controller: ControllerKey, tracker: &mut Self::Tracker);

    fn post(root: &mut Root, controller: ControllerKey, tracker: &mut Self::Tracker);

    fn process(behavior: &mut dyn NodeBehavior, ctx: &mut NodeContext<'_>, tracker: &mut Self::Tracker);

    fn finish(behavior: &mut dyn NodeBehavior, ctx: &mut NodeContext<'_>, tracker: &mut Self::Tracker);

    /// Mark tracker state scoped to the node's subtree
    fn open_scope(_tracker: &Self::Tracker) -> usize {
        0
    }

    fn close_scope(_tracker: &mut Self::Tracker, _scope: usize) {}
}

struct ConfigChangedPass;

impl Pass for ConfigChangedPass {
    type Tracker = ConfigChangedTracker;

    fn participates(_record: &NodeRecord) -> bool {
        true
    }

    fn pre(root: &mut Root, controller: ControllerKey, tracker: &mut Self::Tracker) {
        root.controller_pre_config_changed(controller, tracker);
    }

    fn post(root: &mut Root, controller: ControllerKey, tracker: &mut Self::Tracker) {
        root.controller_post_config_changed(controller, tracker);
    }

    fn process(behavior: &mut dyn NodeBehavior, ctx: &mut NodeContext<'_>, tracker: &mut Self::Tracker) {
        behavior.config_changed(ctx, tracker);
    }

    fn finish(_behavior: &mut dyn NodeBehavior, _ctx: &mut NodeContext<'_>, _tracker: &mut Self::Tracker) {}
}

struct LogicPass;

impl Pass for LogicPass {
    type Tracker = LogicTracker;

    fn participates(record: &NodeRecord) -> bool {
        record.is_active()
    }

    fn pre(root: &mut Root, controller: ControllerKey, tracker: &mut Self::Tracker) {
        root.controller_pre_logic(controller, tracker);
    }

    fn post(root: &mut Root, controller: ControllerKey, tracker: &mut Self::Tracker) {
        root.controller_post_logic(controller, tracker);
    }

    fn process(behavior: &mut dyn NodeBehavior, ctx: &mut NodeContext<'_>, tracker: &mut Self::Tracker) {
        behavior.process_logic(ctx, tracker);
    }

    fn finish(behavior: &mut dyn NodeBehavior, ctx: &mut NodeContext<'_>, tracker: &mut Self::Tracker) {
        behavior.finish_logic(ctx, tracker);
    }

    fn open_scope(tracker: &Self::Tracker) -> usize {
        tracker.timeline_depth()
    }

    fn close_scope(tracker: &mut Self::Tracker, scope: usize) {
        tracker.truncate_timelines(scope);
    }
}

struct InputPass;

impl Pass for InputPass {
    type Tracker = InputTracker;

    fn participates(record: &NodeRecord) -> bool {
        record.is_active()
    }

    fn pre(root: &mut Root, controller: ControllerKey, tracker: &mut Self::Tracker) {
        root.controller_pre_input(controller, tracker);
    }

    fn post(root: &mut Root, controller: ControllerKey, tracker: &mut Self::Tracker) {
        root.controller_post_input(controller, tracker);
    }

    fn process(behavior: &mut dyn NodeBehavior, ctx: &mut NodeContext<'_>, tracker: &mut Self::Tracker) {
        behavior.process_input(ctx, tracker);
    }

    fn finish(behavior: &mut dyn NodeBehavior, ctx: &mut NodeContext<'_>, tracker: &mut Self::Tracker) {
        behavior.finish_input(ctx, tracker);
    }
}

struct OutputPass;

impl Pass for OutputPass {
    type Tracker = OutputTracker;

    fn participates(record: &NodeRecord) -> bool {
        record.is_visible()
    }

    fn pre(root: &mut Root, controller: ControllerKey, tracker: &mut Self::Tracker) {
        root.controller_pre_output(controller, tracker);
    }

    fn post(root: &mut Root, controller: ControllerKey, tracker: &mut Self::Tracker) {
        root.controller_post_output(controller, tracker);
    }

    fn process(behavior: &mut dyn NodeBehavior, ctx: &mut NodeContext<'_>, tracker: &mut Self::Tracker) {
        behavior.process_output(ctx, tracker);
    }

    fn finish(behavior: &mut dyn NodeBehavior, ctx: &mut NodeContext<'_>, tracker: &mut Self::Tracker) {
        behavior.finish_output(ctx, tracker);
    }
}

impl Root {
    /// Let nodes and controllers react to a configuration change
    ///
    /// Variable controllers re-apply their values and link controllers
    /// rebind their targets.
    pub fn config_changed(&mut self, trigger: TraversalMask) -> Result<(), GraphError> {
        let _guard = self.lock.enter(LockMode::Acquire)?;
        let mut tracker = ConfigChangedTracker::new(trigger, self.take_user_data());
        self.visit::<ConfigChangedPass>(self.root_node(), &mut tracker);
        self.collect(tracker.into_core());
        Ok(())
    }

    /// Run one logic step
    pub fn process_logic(&mut self, time: FrameTime, trigger: TraversalMask) -> Result<(), GraphError> {
        let _guard = self.lock.enter(LockMode::Acquire)?;
        let mut tracker = LogicTracker::new(time, trigger, self.take_user_data());
        self.visit::<LogicPass>(self.root_node(), &mut tracker);
        self.collect(tracker.into_core());
        Ok(())
    }

    /// Route input events through the graph
    ///
    /// Returns the events no node consumed.
    pub fn process_input(
        &mut self,
        events: Vec<InputEvent>,
        trigger: TraversalMask,
    ) -> Result<Vec<InputEvent>, GraphError> {
        let _guard = self.lock.enter(LockMode::Acquire)?;
        let mut tracker = InputTracker::new(events, trigger, self.take_user_data());
        self.visit::<InputPass>(self.root_node(), &mut tracker);
        let (core, remaining) = tracker.into_remaining();
        self.collect(core);
        Ok(remaining)
    }

    /// Submit visible nodes to the renderers
    ///
    /// The renderers must be inside a submission; [`crate::Engine::step`]
    /// brackets this call with `begin_submission_all`/`end_submission_all`.
    /// Returns the number of objects pushed.
    pub fn process_output(&mut self, trigger: TraversalMask) -> Result<usize, GraphError> {
        let _guard = self.lock.enter(LockMode::Acquire)?;
        let frame = self.renderers.video.frame();
        let mut tracker = OutputTracker::new(frame, trigger, self.take_user_data());
        self.visit::<OutputPass>(self.root_node(), &mut tracker);
        let pushed = tracker.pushed();
        self.collect(tracker.into_core());
        Ok(pushed)
    }

    fn collect(&mut self, core: TrackerCore) {
        let (results, user_data) = core.finish();
        self.restore_user_data(user_data);
        self.traversal_results.extend(results);
    }

    fn visit<P: Pass>(&mut self, key: NodeKey, tracker: &mut P::Tracker) {
        let Some(record) = self.nodes.get(key) else {
            return;
        };
        if record.state != NodeState::Initialized || !P::participates(record) {
            return;
        }
        let id = record.id.clone();
        let controllers = record.controllers.clone();
        let previous = tracker.core_mut().enter(key, &id);
        if tracker.depth() > self.config.graph.max_depth {
            tracker.add_error("maximum graph depth exceeded; subtree skipped");
            tracker.core_mut().leave(previous);
            return;
        }
        let scope = P::open_scope(tracker);
        tracker.core_mut().reset_finish();

        for &controller in &controllers {
            P::pre(self, controller, tracker);
        }

        // Pre hooks may have switched the node off
        if self.nodes.get(key).is_some_and(P::participates) {
            self.with_node_behavior(key, |behavior, ctx| P::process(behavior, ctx, tracker));
            let cancelled = tracker.core().finish_cancelled();

            let children = self.nodes.get(key).map(|record| record.children.clone()).unwrap_or_default();
            for child in children {
                self.visit::<P>(child, tracker);
            }

            if !cancelled {
                self.with_node_behavior(key, |behavior, ctx| P::finish(behavior, ctx, tracker));
                for &controller in &controllers {
                    P::post(self, controller, tracker);
                }
            }
        }

        P::close_scope(tracker, scope);
        tracker.core_mut().leave(previous);
    }
}
