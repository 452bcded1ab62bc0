//! The graph root
//!
//! Owns every node and controller of one scene graph, together with the
//! namespace index, the modification lock, the user data stacks, the
//! accumulated traversal diagnostics and the renderer set the output
//! traversal submits to.

use std::collections::HashMap;
use std::mem;

use crate::controller::Controller;
use crate::core::EngineConfig;
use crate::foundation::collections::{ControllerKey, NodeKey, SlotMap};
use crate::foundation::math::Transform;
use crate::graph::builtin::NamespaceNode;
use crate::graph::lock::{GraphLock, LockMode, LockProbe};
use crate::graph::node::{Capabilities, NodeBehavior, NodeContext, NodeFlags, NodeRecord, NodeState};
use crate::graph::GraphError;
use crate::registry::ObjectFactory;
use crate::render::Renderers;
use crate::resource::ResourceSet;
use crate::tracker::{TrackerResult, UserDataId, UserDataStack};

/// Scene graph root
pub struct Root {
    pub(crate) nodes: SlotMap<NodeKey, NodeRecord>,
    pub(crate) controllers: SlotMap<ControllerKey, Controller>,
    pub(crate) identifiers: HashMap<NodeKey, HashMap<String, NodeKey>>,
    pub(crate) user_data: UserDataStack,
    pub(crate) init_results: Vec<TrackerResult>,
    pub(crate) deinit_results: Vec<TrackerResult>,
    pub(crate) traversal_results: Vec<TrackerResult>,
    pub(crate) lock: GraphLock,
    pub(crate) renderers: Renderers,
    pub(crate) resources: ResourceSet,
    pub(crate) config: EngineConfig,
    root_node: NodeKey,
}

impl Root {
    /// Create a graph holding only the initialized root namespace node
    pub fn new(config: EngineConfig) -> Self {
        let mut nodes = SlotMap::with_key();
        let mut record = NodeRecord::new("Namespace", Box::new(NamespaceNode));
        record.id = "root".to_string();
        record.state = NodeState::Initialized;
        let root_node = nodes.insert(record);

        let mut identifiers = HashMap::new();
        identifiers.insert(root_node, HashMap::new());

        log::debug!("Created scene graph root");
        Self {
            nodes,
            controllers: SlotMap::with_key(),
            identifiers,
            user_data: UserDataStack::new(),
            init_results: Vec::new(),
            deinit_results: Vec::new(),
            traversal_results: Vec::new(),
            lock: GraphLock::new(),
            renderers: Renderers::new(&config.renderer),
            resources: ResourceSet::new(),
            config,
            root_node,
        }
    }

    /// The root namespace node
    pub fn root_node(&self) -> NodeKey {
        self.root_node
    }

    /// Configuration the graph was created with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the configuration
    ///
    /// Renderer settings take effect immediately; run a config-changed
    /// traversal to let nodes and controllers react.
    pub fn set_config(&mut self, config: EngineConfig) {
        self.renderers.apply_config(&config.renderer);
        self.config = config;
    }

    // --- Nodes --------------------------------------------------------------

    /// Instantiate a registered node class
    ///
    /// The node starts out unattached and uninitialized.
    pub fn create_node(&mut self, class: &str, factory: &ObjectFactory) -> Result<NodeKey, GraphError> {
        let behavior = factory.create_node(class)?;
        Ok(self.create_node_with(class, behavior))
    }

    /// Insert a node with an explicit behavior
    pub fn create_node_with(&mut self, class: impl Into<String>, behavior: Box<dyn NodeBehavior>) -> NodeKey {
        let record = NodeRecord::new(class, behavior);
        log::trace!("Created node of class '{}'", record.class_name);
        self.nodes.insert(record)
    }

    /// Destroy an uninitialized, childless node
    ///
    /// Controllers still attached to the node are destroyed with it.
    /// Detached controllers tagged with the node are left alone.
    ///
    /// Always acquires the graph lock, so it cannot be called from a hook
    /// running inside a traversal or while [`Root::lock`] is held.
    pub fn destroy_node(&mut self, key: NodeKey) -> Result<(), GraphError> {
        let _guard = self.lock.enter(LockMode::Acquire)?;
        self.discard_node(key)
    }

    /// Destroy checks and removal, without touching the lock
    pub(crate) fn discard_node(&mut self, key: NodeKey) -> Result<(), GraphError> {
        if key == self.root_node {
            return Err(GraphError::RootNode);
        }
        let record = self.nodes.get(key).ok_or(GraphError::StaleNode(key))?;
        if record.state != NodeState::Unattached {
            return Err(GraphError::StillInitialized);
        }
        if !record.children.is_empty() {
            return Err(GraphError::HasChildren);
        }

        let Some(mut record) = self.nodes.remove(key) else {
            return Err(GraphError::StaleNode(key));
        };
        for parent in record.parents.drain(..) {
            if let Some(parent) = self.nodes.get_mut(parent) {
                parent.children.retain(|&child| child != key);
            }
        }
        for controller in record.controllers.drain(..) {
            self.controllers.remove(controller);
        }
        record.state = NodeState::Destroyed;
        log::trace!("Destroyed node '{}'", record.id);
        Ok(())
    }

    /// Attach a child below an uninitialized parent
    ///
    /// Used to assemble a subtree before handing it to `init_graph`. A child
    /// may be attached below several parents; the first attachment is its
    /// primary parent.
    pub fn attach_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), GraphError> {
        let parent_record = self.nodes.get(parent).ok_or(GraphError::StaleNode(parent))?;
        if parent_record.state != NodeState::Unattached {
            return Err(GraphError::ParentInitialized);
        }
        if parent_record.children.contains(&child) {
            return Err(GraphError::AlreadyLinked);
        }
        let child_record = self.nodes.get(child).ok_or(GraphError::StaleNode(child))?;
        if child_record.state != NodeState::Unattached {
            return Err(GraphError::AlreadyInitialized);
        }
        if child == self.root_node {
            return Err(GraphError::RootNode);
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(GraphError::WouldCycle);
        }

        self.nodes[parent].children.push(child);
        self.nodes[child].parents.push(parent);
        Ok(())
    }

    /// Borrow a node record
    pub fn node(&self, key: NodeKey) -> Option<&NodeRecord> {
        self.nodes.get(key)
    }

    /// Mutably borrow a node record
    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut NodeRecord> {
        self.nodes.get_mut(key)
    }

    /// Whether the handle refers to a live node
    pub fn contains_node(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Number of nodes, the root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the node is initialized; stale handles read as `false`
    pub fn is_initialized(&self, key: NodeKey) -> bool {
        self.nodes.get(key).is_some_and(NodeRecord::is_initialized)
    }

    /// Whether the node takes part in logic/input traversals
    pub fn is_active(&self, key: NodeKey) -> bool {
        self.nodes.get(key).is_some_and(NodeRecord::is_active)
    }

    /// Whether the node takes part in output traversals
    pub fn is_visible(&self, key: NodeKey) -> bool {
        self.nodes.get(key).is_some_and(NodeRecord::is_visible)
    }

    /// Children of a node
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes.get(key).map(NodeRecord::children).unwrap_or_default()
    }

    /// Parents of a node, primary first
    pub fn parents(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes.get(key).map(NodeRecord::parents).unwrap_or_default()
    }

    /// Toggle logic/input participation
    pub fn set_active(&mut self, key: NodeKey, active: bool) -> Result<(), GraphError> {
        let record = self.nodes.get_mut(key).ok_or(GraphError::StaleNode(key))?;
        record.flags.set(NodeFlags::ACTIVE, active);
        Ok(())
    }

    /// Toggle output participation
    pub fn set_visible(&mut self, key: NodeKey, visible: bool) -> Result<(), GraphError> {
        let record = self.nodes.get_mut(key).ok_or(GraphError::StaleNode(key))?;
        record.flags.set(NodeFlags::VISIBLE, visible);
        Ok(())
    }

    /// Set the identifier of an uninitialized node
    ///
    /// Identifiers are registered in their namespace when the node is
    /// initialized, so renaming a live node is refused.
    pub fn set_node_id(&mut self, key: NodeKey, id: impl Into<String>) -> Result<(), GraphError> {
        let record = self.nodes.get_mut(key).ok_or(GraphError::StaleNode(key))?;
        if record.state != NodeState::Unattached {
            return Err(GraphError::StillInitialized);
        }
        record.id = id.into();
        Ok(())
    }

    /// World transform of a node
    ///
    /// Composes the `transform` properties of every transform-capable node
    /// on the primary-parent chain, outermost first.
    pub fn world_transform(&self, key: NodeKey) -> Transform {
        let mut chain = Vec::new();
        let mut current = Some(key);
        while let Some(node) = current.and_then(|key| self.nodes.get(key)) {
            if node.capabilities.contains(Capabilities::TRANSFORM) {
                if let Some(transform) = node.property("transform").and_then(|value| value.as_transform()) {
                    chain.push(transform);
                }
            }
            current = node.primary_parent();
            if chain.len() > self.config.graph.max_depth {
                break;
            }
        }
        chain
            .iter()
            .rev()
            .fold(Transform::identity(), |world, local| world.combine(local))
    }

    pub(crate) fn is_ancestor_or_self(&self, candidate: NodeKey, node: NodeKey) -> bool {
        let mut pending = vec![node];
        let mut visited = Vec::new();
        while let Some(current) = pending.pop() {
            if current == candidate {
                return true;
            }
            if visited.contains(&current) {
                continue;
            }
            visited.push(current);
            if let Some(record) = self.nodes.get(current) {
                pending.extend_from_slice(&record.parents);
            }
        }
        false
    }

    /// Run `f` with the node's behavior detached from its record
    ///
    /// Returns `None` for stale handles and while the behavior is already
    /// detached by an outer hook of the same node.
    pub(crate) fn with_node_behavior<R>(
        &mut self,
        key: NodeKey,
        f: impl FnOnce(&mut dyn NodeBehavior, &mut NodeContext<'_>) -> R,
    ) -> Option<R> {
        let mut behavior = self.nodes.get_mut(key)?.behavior.take()?;
        let result = {
            let mut ctx = NodeContext::new(self, key);
            f(behavior.as_mut(), &mut ctx)
        };
        if let Some(record) = self.nodes.get_mut(key) {
            record.behavior = Some(behavior);
        }
        Some(result)
    }

    // --- Diagnostics --------------------------------------------------------

    /// Diagnostics accumulated by Init traversals
    pub fn init_results(&self) -> &[TrackerResult] {
        &self.init_results
    }

    /// Diagnostics accumulated by DeInit traversals
    pub fn deinit_results(&self) -> &[TrackerResult] {
        &self.deinit_results
    }

    /// Diagnostics of the most recent config-changed, logic, input or output traversal
    pub fn traversal_results(&self) -> &[TrackerResult] {
        &self.traversal_results
    }

    /// Drop accumulated Init/DeInit diagnostics
    pub fn clear_results(&mut self) {
        self.init_results.clear();
        self.deinit_results.clear();
    }

    // --- Locking ------------------------------------------------------------

    /// Take the graph lock for a batch of edits
    ///
    /// Calls made while holding it must pass [`LockMode::AssumeHeld`].
    pub fn lock(&self) -> Result<(), GraphError> {
        self.lock.acquire()
    }

    /// Release a lock taken with [`Root::lock`]
    ///
    /// Must be called from the thread that took it; a lock held by another
    /// thread or by a running traversal is left in place.
    pub fn unlock(&self) {
        self.lock.release();
    }

    /// Whether no traversal or edit is in flight
    pub fn can_modify_graph(&self) -> bool {
        !self.lock.is_locked()
    }

    /// A `Send + Sync` view of the lock for other threads
    pub fn lock_probe(&self) -> LockProbe {
        self.lock.probe()
    }

    // --- User data ----------------------------------------------------------

    /// Acquire a user data id
    ///
    /// Ids are acquired between traversals; the stacks are lent to the
    /// tracker while a traversal runs.
    pub fn acquire_user_data_id(&mut self) -> UserDataId {
        self.user_data.acquire()
    }

    /// Release a user data id
    pub fn release_user_data_id(&mut self, id: UserDataId) -> bool {
        self.user_data.release(id)
    }

    pub(crate) fn take_user_data(&mut self) -> UserDataStack {
        mem::take(&mut self.user_data)
    }

    pub(crate) fn restore_user_data(&mut self, user_data: UserDataStack) {
        self.user_data = user_data;
    }

    // --- Collaborators ------------------------------------------------------

    /// Renderer set
    pub fn renderers(&self) -> &Renderers {
        &self.renderers
    }

    /// Renderer set, mutably
    pub fn renderers_mut(&mut self) -> &mut Renderers {
        &mut self.renderers
    }

    /// Loaded resources
    pub fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    /// Loaded resources, mutably
    pub fn resources_mut(&mut self) -> &mut ResourceSet {
        &mut self.resources
    }
}

impl Default for Root {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Root")
            .field("nodes", &self.nodes.len())
            .field("controllers", &self.controllers.len())
            .field("locked", &self.lock.is_locked())
            .finish_non_exhaustive()
    }
}
