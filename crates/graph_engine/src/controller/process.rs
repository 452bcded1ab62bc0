//! Controller ownership, lifecycle and per-phase dispatch
//!
//! Controllers live in the root's arena next to the nodes. A controller is
//! created detached but tagged with its owner; adding it to the owner's list
//! makes the traversals visit it. Built-in facet work runs before the
//! behavior's own hook of the same phase.

use std::mem;

use crate::controller::{Controller, ControllerBehavior, ControllerContext, ControllerState, Facets};
use crate::foundation::collections::{ControllerKey, NodeKey};
use crate::graph::{GraphError, NodeFlags, PropertyValue, Root};
use crate::registry::ObjectFactory;
use crate::target::NodeTarget;
use crate::tracker::{
    ConfigChangedTracker, DeInitTracker, InitTracker, InputTracker, LogicTracker, OutputTracker, Tracker,
    TraversalMask,
};

impl Root {
    // --- Ownership ----------------------------------------------------------

    /// Instantiate a registered controller class, tagged with `owner`
    ///
    /// The controller is not processed until it is added to the owner.
    pub fn create_controller(
        &mut self,
        class: &str,
        owner: NodeKey,
        factory: &ObjectFactory,
    ) -> Result<ControllerKey, GraphError> {
        let controller = factory.create_controller(class)?;
        self.insert_controller(owner, controller)
    }

    /// Insert a controller built by hand, tagged with `owner`
    pub fn insert_controller(&mut self, owner: NodeKey, mut controller: Controller) -> Result<ControllerKey, GraphError> {
        if !self.nodes.contains_key(owner) {
            return Err(GraphError::StaleNode(owner));
        }
        controller.owner = owner;
        controller.attached = false;
        controller.state = ControllerState::Uninitialized;
        log::trace!("Created controller of class '{}'", controller.class_name);
        Ok(self.controllers.insert(controller))
    }

    /// Borrow a controller
    pub fn controller(&self, key: ControllerKey) -> Option<&Controller> {
        self.controllers.get(key)
    }

    /// Mutably borrow a controller
    pub fn controller_mut(&mut self, key: ControllerKey) -> Option<&mut Controller> {
        self.controllers.get_mut(key)
    }

    /// Number of live controllers, attached or not
    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    /// Append a controller to its owner's list
    ///
    /// Controllers added before the owner initializes are initialized by the
    /// owner's Init cascade; after that, call [`Root::init_controller`].
    pub fn add_controller(&mut self, node: NodeKey, key: ControllerKey) -> Result<(), GraphError> {
        if !self.nodes.contains_key(node) {
            return Err(GraphError::StaleNode(node));
        }
        let controller = self.controllers.get_mut(key).ok_or(GraphError::StaleController(key))?;
        if controller.owner != node {
            return Err(GraphError::OwnerMismatch);
        }
        if controller.attached {
            return Err(GraphError::AlreadyAttached);
        }
        controller.attached = true;
        self.nodes[node].controllers.push(key);
        Ok(())
    }

    /// Remove a controller from its owner's list
    ///
    /// An initialized controller is de-initialized first. The controller
    /// keeps its owner tag and can be added again or destroyed.
    pub fn remove_controller(&mut self, node: NodeKey, key: ControllerKey) -> Result<(), GraphError> {
        let controller = self.controllers.get(key).ok_or(GraphError::StaleController(key))?;
        if controller.owner != node {
            return Err(GraphError::OwnerMismatch);
        }
        if !controller.attached {
            return Err(GraphError::NotAttached);
        }
        if controller.state != ControllerState::Uninitialized {
            self.deinit_controller(key)?;
        }
        if let Some(record) = self.nodes.get_mut(node) {
            record.controllers.retain(|&attached| attached != key);
        }
        if let Some(controller) = self.controllers.get_mut(key) {
            controller.attached = false;
        }
        Ok(())
    }

    /// Re-tag a detached, uninitialized controller
    pub fn set_controller_owner(&mut self, key: ControllerKey, node: NodeKey) -> Result<(), GraphError> {
        if !self.nodes.contains_key(node) {
            return Err(GraphError::StaleNode(node));
        }
        let controller = self.controllers.get_mut(key).ok_or(GraphError::StaleController(key))?;
        if controller.state != ControllerState::Uninitialized {
            return Err(GraphError::AlreadyInitialized);
        }
        if controller.attached {
            return Err(GraphError::StillAttached);
        }
        controller.owner = node;
        Ok(())
    }

    /// Destroy an uninitialized controller, detaching it if needed
    pub fn destroy_controller(&mut self, key: ControllerKey) -> Result<(), GraphError> {
        let controller = self.controllers.get(key).ok_or(GraphError::StaleController(key))?;
        if controller.state != ControllerState::Uninitialized {
            return Err(GraphError::StillInitialized);
        }
        let owner = controller.owner;
        if controller.attached {
            if let Some(record) = self.nodes.get_mut(owner) {
                record.controllers.retain(|&attached| attached != key);
            }
        }
        self.controllers.remove(key);
        Ok(())
    }

    // --- Explicit lifecycle -------------------------------------------------

    /// Initialize a controller added after its owner was initialized
    ///
    /// Runs PreInit and PostInit back to back. Diagnostics go to
    /// [`Root::init_results`]; returns `Ok(false)` if any error was recorded.
    pub fn init_controller(&mut self, key: ControllerKey) -> Result<bool, GraphError> {
        let controller = self.controllers.get(key).ok_or(GraphError::StaleController(key))?;
        if controller.state != ControllerState::Uninitialized {
            return Err(GraphError::AlreadyInitialized);
        }
        if !controller.attached {
            return Err(GraphError::NotAttached);
        }
        let owner = controller.owner;
        if !self.is_initialized(owner) {
            return Err(GraphError::ParentNotInitialized);
        }

        let mut tracker = InitTracker::new(self.take_user_data());
        let previous = tracker.core_mut().enter(owner, self.node_id(owner));
        if self.controller_pre_init(key, &mut tracker) {
            self.controller_post_init(key, &mut tracker);
        }
        tracker.core_mut().leave(previous);

        let ok = tracker.core().error_count() == 0;
        let (results, user_data) = tracker.into_core().finish();
        self.restore_user_data(user_data);
        self.init_results.extend(results);
        Ok(ok)
    }

    /// De-initialize a controller outside of its owner's DeInit cascade
    pub fn deinit_controller(&mut self, key: ControllerKey) -> Result<bool, GraphError> {
        let controller = self.controllers.get(key).ok_or(GraphError::StaleController(key))?;
        if controller.state == ControllerState::Uninitialized {
            return Err(GraphError::NotInitialized);
        }
        let owner = controller.owner;

        let mut tracker = DeInitTracker::new(self.take_user_data());
        let previous = tracker.core_mut().enter(owner, self.node_id(owner));
        self.controller_pre_deinit(key, &mut tracker);
        self.controller_post_deinit(key, &mut tracker);
        tracker.core_mut().leave(previous);

        let ok = tracker.core().error_count() == 0;
        let (results, user_data) = tracker.into_core().finish();
        self.restore_user_data(user_data);
        self.deinit_results.extend(results);
        Ok(ok)
    }

    fn node_id(&self, key: NodeKey) -> &str {
        self.nodes.get(key).map_or("", |record| record.id.as_str())
    }

    // --- Plumbing -----------------------------------------------------------

    /// Run `f` with the controller's behavior detached from its record
    pub(crate) fn with_controller_behavior<R>(
        &mut self,
        key: ControllerKey,
        f: impl FnOnce(&mut dyn ControllerBehavior, &mut ControllerContext<'_>) -> R,
    ) -> Option<R> {
        let controller = self.controllers.get_mut(key)?;
        let owner = controller.owner;
        let mut behavior = controller.behavior.take()?;
        let result = {
            let mut ctx = ControllerContext::new(self, key, owner);
            f(behavior.as_mut(), &mut ctx)
        };
        if let Some(controller) = self.controllers.get_mut(key) {
            controller.behavior = Some(behavior);
        }
        Some(result)
    }

    /// Run `f` with the controller's facets detached from its record
    fn with_facets<R>(&mut self, key: ControllerKey, f: impl FnOnce(&mut Facets, &mut Self, NodeKey) -> R) -> Option<R> {
        let controller = self.controllers.get_mut(key)?;
        let owner = controller.owner;
        let mut facets = mem::take(&mut controller.facets);
        let result = f(&mut facets, self, owner);
        if let Some(controller) = self.controllers.get_mut(key) {
            controller.facets = facets;
        }
        Some(result)
    }

    fn set_controller_state(&mut self, key: ControllerKey, state: ControllerState) {
        if let Some(controller) = self.controllers.get_mut(key) {
            controller.state = state;
        }
    }

    /// Whether a live controller responds to a traversal
    fn responds(&self, key: ControllerKey, trigger: TraversalMask, select: fn(&Controller) -> TraversalMask) -> bool {
        self.controllers
            .get(key)
            .is_some_and(|controller| controller.is_initialized() && select(controller).intersects(trigger))
    }

    // --- Init / DeInit ------------------------------------------------------

    /// Build evaluators and run PreInit; `false` leaves the controller uninitialized
    pub(crate) fn controller_pre_init(&mut self, key: ControllerKey, tracker: &mut InitTracker) -> bool {
        let Some(controller) = self.controllers.get(key) else {
            return false;
        };
        if controller.state != ControllerState::Uninitialized {
            return false;
        }
        let class = controller.class_name.clone();

        let built = self
            .with_facets(key, |facets, root, _| facets.build_evaluators(&root.resources))
            .unwrap_or(Ok(()));
        if let Err(message) = built {
            tracker.add_error(format!("controller '{class}' failed to build evaluators: {message}"));
            return false;
        }

        self.set_controller_state(key, ControllerState::Initializing);
        let ok = self
            .with_controller_behavior(key, |behavior, ctx| behavior.pre_init(ctx, tracker))
            .unwrap_or(true);
        if !ok {
            tracker.add_error(format!("controller '{class}' failed to initialize"));
            self.with_facets(key, |facets, _, _| facets.release_evaluators());
            self.set_controller_state(key, ControllerState::Uninitialized);
        }
        ok
    }

    /// Resolve targets and run PostInit; the controller ends up initialized
    pub(crate) fn controller_post_init(&mut self, key: ControllerKey, tracker: &mut InitTracker) -> bool {
        if self.controllers.get(key).map(Controller::state) != Some(ControllerState::Initializing) {
            return false;
        }
        self.with_facets(key, |facets, root, owner| resolve_targets(facets, root, owner));
        let ok = self
            .with_controller_behavior(key, |behavior, ctx| behavior.post_init(ctx, tracker))
            .unwrap_or(true);
        if !ok {
            tracker.add_error("controller post-init failed");
        }
        self.set_controller_state(key, ControllerState::Initialized);
        ok
    }

    pub(crate) fn controller_pre_deinit(&mut self, key: ControllerKey, tracker: &mut DeInitTracker) -> bool {
        if self.controllers.get(key).map(Controller::state) != Some(ControllerState::Initialized) {
            return false;
        }
        self.set_controller_state(key, ControllerState::DeInitializing);
        let ok = self
            .with_controller_behavior(key, |behavior, ctx| behavior.pre_deinit(ctx, tracker))
            .unwrap_or(true);
        if !ok {
            tracker.add_error("controller pre-deinit failed");
        }
        ok
    }

    /// Run PostDeInit and release evaluators; the controller ends up uninitialized
    pub(crate) fn controller_post_deinit(&mut self, key: ControllerKey, tracker: &mut DeInitTracker) -> bool {
        if self.controllers.get(key).map(Controller::state) != Some(ControllerState::DeInitializing) {
            return false;
        }
        let ok = self
            .with_controller_behavior(key, |behavior, ctx| behavior.post_deinit(ctx, tracker))
            .unwrap_or(true);
        if !ok {
            tracker.add_error("controller post-deinit failed");
        }
        self.with_facets(key, |facets, _, _| {
            facets.release_evaluators();
            if let Some(link) = &mut facets.link {
                link.target.invalidate();
            }
            if let Some(node_link) = &mut facets.node_link {
                node_link.target.invalidate();
            }
        });
        self.set_controller_state(key, ControllerState::Uninitialized);
        ok
    }

    // --- Traversal hooks ----------------------------------------------------

    pub(crate) fn controller_pre_config_changed(&mut self, key: ControllerKey, tracker: &mut ConfigChangedTracker) {
        if !self.responds(key, tracker.trigger_mask(), |c| c.responses.config_changed) {
            return;
        }
        self.with_facets(key, |facets, root, owner| {
            if let (Some(variable), Some(record)) = (&mut facets.variable, root.nodes.get_mut(owner)) {
                variable.apply_all(record);
            }
            resolve_targets(facets, root, owner);
        });
        self.with_controller_behavior(key, |behavior, ctx| behavior.pre_config_changed(ctx, tracker));
    }

    pub(crate) fn controller_post_config_changed(&mut self, key: ControllerKey, tracker: &mut ConfigChangedTracker) {
        if self.responds(key, tracker.trigger_mask(), |c| c.responses.config_changed) {
            self.with_controller_behavior(key, |behavior, ctx| behavior.post_config_changed(ctx, tracker));
        }
    }

    pub(crate) fn controller_pre_logic(&mut self, key: ControllerKey, tracker: &mut LogicTracker) {
        if !self.responds(key, tracker.trigger_mask(), |c| c.responses.logic) {
            return;
        }
        self.with_facets(key, |facets, root, owner| run_logic_facets(facets, root, owner, tracker));
        self.with_controller_behavior(key, |behavior, ctx| behavior.pre_logic(ctx, tracker));
    }

    pub(crate) fn controller_post_logic(&mut self, key: ControllerKey, tracker: &mut LogicTracker) {
        if self.responds(key, tracker.trigger_mask(), |c| c.responses.logic) {
            self.with_controller_behavior(key, |behavior, ctx| behavior.post_logic(ctx, tracker));
        }
    }

    pub(crate) fn controller_pre_input(&mut self, key: ControllerKey, tracker: &mut InputTracker) {
        if self.responds(key, tracker.trigger_mask(), |c| c.responses.input) {
            self.with_controller_behavior(key, |behavior, ctx| behavior.pre_input(ctx, tracker));
        }
    }

    pub(crate) fn controller_post_input(&mut self, key: ControllerKey, tracker: &mut InputTracker) {
        if self.responds(key, tracker.trigger_mask(), |c| c.responses.input) {
            self.with_controller_behavior(key, |behavior, ctx| behavior.post_input(ctx, tracker));
        }
    }

    pub(crate) fn controller_pre_output(&mut self, key: ControllerKey, tracker: &mut OutputTracker) {
        if self.responds(key, tracker.trigger_mask(), |c| c.responses.output) {
            self.with_controller_behavior(key, |behavior, ctx| behavior.pre_output(ctx, tracker));
        }
    }

    pub(crate) fn controller_post_output(&mut self, key: ControllerKey, tracker: &mut OutputTracker) {
        if self.responds(key, tracker.trigger_mask(), |c| c.responses.output) {
            self.with_controller_behavior(key, |behavior, ctx| behavior.post_output(ctx, tracker));
        }
    }
}

/// Bind link targets against the owner's namespace
fn resolve_targets(facets: &mut Facets, root: &Root, owner: NodeKey) {
    let Some(namespace) = root.namespace_of(owner) else {
        return;
    };
    if let Some(link) = &mut facets.link {
        link.target.resolve(root, namespace);
    }
    if let Some(node_link) = &mut facets.node_link {
        node_link.target.resolve(root, namespace);
    }
}

/// Variables, property links, node links, then time evaluation
fn run_logic_facets(facets: &mut Facets, root: &mut Root, owner: NodeKey, tracker: &LogicTracker) {
    if let (Some(variable), Some(record)) = (&mut facets.variable, root.nodes.get_mut(owner)) {
        variable.flush(record);
    }

    let stale = |target: &NodeTarget, root: &Root| !target.is_empty() && target.get_node(root, 0).is_none();
    let needs_rebind = facets.link.as_ref().is_some_and(|link| stale(&link.target, root))
        || facets.node_link.as_ref().is_some_and(|node_link| stale(&node_link.target, root));
    if needs_rebind {
        resolve_targets(facets, root, owner);
    }

    if let Some(link) = &facets.link {
        let copied: Vec<(String, PropertyValue)> = link
            .target
            .get_node(root, 0)
            .and_then(|source| root.node(source))
            .map(|source| {
                link.properties
                    .iter()
                    .filter_map(|(from, to)| source.property(from).map(|value| (to.clone(), value.clone())))
                    .collect()
            })
            .unwrap_or_default();
        if let Some(record) = root.nodes.get_mut(owner) {
            for (name, value) in copied {
                record.set_property(name, value);
            }
        }
    }

    if let Some(node_link) = &facets.node_link {
        let source_flags: Option<NodeFlags> = node_link
            .target
            .get_node(root, 0)
            .and_then(|source| root.node(source))
            .map(|source| source.flags);
        if let (Some(source_flags), Some(record)) = (source_flags, root.nodes.get_mut(owner)) {
            record.flags = node_link.mirror(record.flags, source_flags);
        }
    }

    if let Some(time) = &mut facets.time {
        let writes = time.evaluate(tracker.active_timelines());
        if let Some(record) = root.nodes.get_mut(owner) {
            for (name, value) in writes {
                record.set_property(name, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{FacetController, LinkFacet, NodeLinkFacet, NodeLinkMode, VariableFacet};
    use crate::graph::builtin::GroupNode;
    use crate::graph::LockMode;

    fn live_group(root: &mut Root, id: &str) -> NodeKey {
        let node = root.create_node_with("Group", Box::new(GroupNode));
        root.set_node_id(node, id).unwrap();
        let parent = root.root_node();
        assert!(root.init_graph(node, parent, None, LockMode::Acquire).unwrap());
        node
    }

    fn plain(facets: Facets) -> Controller {
        Controller::new("Controller", facets, Box::new(FacetController))
    }

    #[test]
    fn test_add_requires_matching_owner() {
        let mut root = Root::default();
        let a = root.create_node_with("Group", Box::new(GroupNode));
        let b = root.create_node_with("Group", Box::new(GroupNode));
        let controller = root.insert_controller(a, plain(Facets::new())).unwrap();

        assert_eq!(root.add_controller(b, controller), Err(GraphError::OwnerMismatch));
        root.add_controller(a, controller).unwrap();
        assert_eq!(root.add_controller(a, controller), Err(GraphError::AlreadyAttached));
        assert_eq!(root.node(a).unwrap().controllers(), &[controller]);
    }

    #[test]
    fn test_owner_change_rules() {
        let mut root = Root::default();
        let node = live_group(&mut root, "owner");
        let other = root.create_node_with("Group", Box::new(GroupNode));
        let controller = root.insert_controller(node, plain(Facets::new())).unwrap();

        root.set_controller_owner(controller, other).unwrap();
        root.set_controller_owner(controller, node).unwrap();
        root.add_controller(node, controller).unwrap();
        assert_eq!(root.set_controller_owner(controller, other), Err(GraphError::StillAttached));

        assert!(root.init_controller(controller).unwrap());
        assert!(root.controller(controller).unwrap().is_initialized());
        assert_eq!(root.set_controller_owner(controller, other), Err(GraphError::AlreadyInitialized));
        assert_eq!(root.destroy_controller(controller), Err(GraphError::StillInitialized));
    }

    #[test]
    fn test_init_controller_requires_live_owner() {
        let mut root = Root::default();
        let node = root.create_node_with("Group", Box::new(GroupNode));
        let controller = root.insert_controller(node, plain(Facets::new())).unwrap();
        assert_eq!(root.init_controller(controller), Err(GraphError::NotAttached));
        root.add_controller(node, controller).unwrap();
        assert_eq!(root.init_controller(controller), Err(GraphError::ParentNotInitialized));
        assert_eq!(root.deinit_controller(controller), Err(GraphError::NotInitialized));
    }

    #[test]
    fn test_remove_deinitializes_and_keeps_owner() {
        let mut root = Root::default();
        let node = live_group(&mut root, "owner");
        let controller = root.insert_controller(node, plain(Facets::new())).unwrap();
        root.add_controller(node, controller).unwrap();
        root.init_controller(controller).unwrap();

        root.remove_controller(node, controller).unwrap();
        let record = root.controller(controller).unwrap();
        assert_eq!(record.state(), ControllerState::Uninitialized);
        assert!(!record.is_attached());
        assert_eq!(record.owner(), node);
        assert!(root.node(node).unwrap().controllers().is_empty());
        root.destroy_controller(controller).unwrap();
        assert!(root.controller(controller).is_none());
    }

    #[test]
    fn test_variables_flush_in_logic() {
        let mut root = Root::default();
        let node = live_group(&mut root, "owner");
        let mut variables = VariableFacet::new();
        variables.set("speed", 3.0);
        let controller = root
            .insert_controller(node, plain(Facets::new().with_variable(variables)))
            .unwrap();
        root.add_controller(node, controller).unwrap();
        root.init_controller(controller).unwrap();

        root.process_logic(Default::default(), TraversalMask::DEFAULT).unwrap();
        assert_eq!(root.node(node).unwrap().property("speed"), Some(&PropertyValue::Float(3.0)));

        root.controller_mut(controller)
            .and_then(Controller::variable_mut)
            .unwrap()
            .set("speed", 5.0);
        root.process_logic(Default::default(), TraversalMask::DEFAULT).unwrap();
        assert_eq!(root.node(node).unwrap().property("speed"), Some(&PropertyValue::Float(5.0)));
    }

    #[test]
    fn test_link_copies_and_node_link_mirrors() {
        let mut root = Root::default();
        let source = live_group(&mut root, "source");
        let owner = live_group(&mut root, "owner");
        root.node_mut(source).unwrap().set_property("score", 7_i64);
        root.set_visible(source, false).unwrap();

        let facets = Facets::new()
            .with_link(LinkFacet::new("source").with_property("score", "copied"))
            .with_node_link(NodeLinkFacet::new("/source", NodeLinkMode::Visible));
        let controller = root.insert_controller(owner, plain(facets)).unwrap();
        root.add_controller(owner, controller).unwrap();
        root.init_controller(controller).unwrap();

        root.process_logic(Default::default(), TraversalMask::DEFAULT).unwrap();
        let record = root.node(owner).unwrap();
        assert_eq!(record.property("copied"), Some(&PropertyValue::Int(7)));
        assert!(!record.is_visible());
        assert!(record.is_active());
    }
}
