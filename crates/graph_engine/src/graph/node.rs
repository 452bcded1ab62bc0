//! Node records and node behaviors
//!
//! A node is split in two: the engine-owned [`NodeRecord`] holding identity,
//! topology, flags, lifecycle state and the property bag, and a boxed
//! [`NodeBehavior`] supplying the class-specific hooks.

use std::any::Any;
use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::foundation::collections::{ControllerKey, NodeKey};
use crate::graph::property::{Attributes, PropertyValue};
use crate::graph::Root;
use crate::render::Renderers;
use crate::tracker::{
    ConfigChangedTracker, DeInitTracker, InitTracker, InputTracker, LogicTracker, OutputTracker,
};

bitflags! {
    /// Independent participation flags of a node
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// Participates in logic and input traversals
        const ACTIVE = 1 << 0;
        /// Participates in output traversals
        const VISIBLE = 1 << 1;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::ACTIVE | Self::VISIBLE
    }
}

bitflags! {
    /// Capability interfaces a node class declares
    ///
    /// Targets check these before handing out a reference, so a slot
    /// declared for cameras never yields a node that is not one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Opens a new identifier namespace for its subtree
        const NAMESPACE = 1 << 0;
        /// Indirection to another node
        const REFERENCE = 1 << 1;
        /// Broadcasts time to time controllers
        const TIMELINE = 1 << 2;
        /// Carries a local transform
        const TRANSFORM = 1 << 3;
        /// Selects the current camera for video output
        const CAMERA = 1 << 4;
        /// Selects the current listener for audio output
        const LISTENER = 1 << 5;
        /// Selects the current physics island
        const ISLAND = 1 << 6;
        /// Pushes an object to the video renderer
        const DRAWABLE = 1 << 7;
        /// Pushes an object to the audio renderer
        const PLAYABLE = 1 << 8;
        /// Pushes an object to the physics simulator
        const SIMULATABLE = 1 << 9;
    }
}

/// Lifecycle state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Created, not part of the live graph
    Unattached,
    /// Init cascade in progress
    Initializing,
    /// Live
    Initialized,
    /// DeInit cascade in progress
    DeInitializing,
    /// Removed from the arena; only observed through stale handles
    Destroyed,
}

/// Class-specific node behavior
///
/// Every hook has a no-op default. `init`/`deinit` report failure by
/// returning `false`; the traversal records a diagnostic and carries on with
/// siblings.
pub trait NodeBehavior: Any + Send {
    /// Capability interfaces implemented by this class
    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    /// Apply template attributes before the node is initialized
    fn configure(&mut self, attributes: &Attributes) -> Result<(), String> {
        let _ = attributes;
        Ok(())
    }

    /// Node initialization, between controller PreInit and the children
    fn init(&mut self, ctx: &mut NodeContext<'_>, tracker: &mut InitTracker) -> bool {
        let _ = (ctx, tracker);
        true
    }

    /// Node de-initialization, after the children
    fn deinit(&mut self, ctx: &mut NodeContext<'_>, tracker: &mut DeInitTracker) -> bool {
        let _ = (ctx, tracker);
        true
    }

    /// Configuration changed
    fn config_changed(&mut self, ctx: &mut NodeContext<'_>, tracker: &mut ConfigChangedTracker) {
        let _ = (ctx, tracker);
    }

    /// Logic step, before the children
    fn process_logic(&mut self, ctx: &mut NodeContext<'_>, tracker: &mut LogicTracker) {
        let _ = (ctx, tracker);
    }

    /// Logic step, after the children
    fn finish_logic(&mut self, ctx: &mut NodeContext<'_>, tracker: &mut LogicTracker) {
        let _ = (ctx, tracker);
    }

    /// Input step, before the children
    fn process_input(&mut self, ctx: &mut NodeContext<'_>, tracker: &mut InputTracker) {
        let _ = (ctx, tracker);
    }

    /// Input step, after the children
    fn finish_input(&mut self, ctx: &mut NodeContext<'_>, tracker: &mut InputTracker) {
        let _ = (ctx, tracker);
    }

    /// Output step, before the children
    fn process_output(&mut self, ctx: &mut NodeContext<'_>, tracker: &mut OutputTracker) {
        let _ = (ctx, tracker);
    }

    /// Output step, after the children
    fn finish_output(&mut self, ctx: &mut NodeContext<'_>, tracker: &mut OutputTracker) {
        let _ = (ctx, tracker);
    }

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Engine-side record of a node
pub struct NodeRecord {
    pub(crate) id: String,
    pub(crate) class_name: String,
    pub(crate) flags: NodeFlags,
    pub(crate) capabilities: Capabilities,
    pub(crate) state: NodeState,
    pub(crate) parents: Vec<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
    pub(crate) controllers: Vec<ControllerKey>,
    pub(crate) namespace: Option<NodeKey>,
    pub(crate) properties: BTreeMap<String, PropertyValue>,
    pub(crate) behavior: Option<Box<dyn NodeBehavior>>,
}

impl NodeRecord {
    pub(crate) fn new(class_name: impl Into<String>, behavior: Box<dyn NodeBehavior>) -> Self {
        Self {
            id: String::new(),
            class_name: class_name.into(),
            flags: NodeFlags::default(),
            capabilities: behavior.capabilities(),
            state: NodeState::Unattached,
            parents: Vec::new(),
            children: Vec::new(),
            controllers: Vec::new(),
            namespace: None,
            properties: BTreeMap::new(),
            behavior: Some(behavior),
        }
    }

    /// Identifier, unique within the node's namespace (may be empty)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Registered class name
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Participation flags
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    /// Whether the node takes part in logic/input traversals
    pub fn is_active(&self) -> bool {
        self.flags.contains(NodeFlags::ACTIVE)
    }

    /// Whether the node takes part in output traversals
    pub fn is_visible(&self) -> bool {
        self.flags.contains(NodeFlags::VISIBLE)
    }

    /// Declared capability interfaces
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Lifecycle state
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Whether the node completed an Init cascade and has not been de-initialized
    pub fn is_initialized(&self) -> bool {
        self.state == NodeState::Initialized
    }

    /// Parents; the first entry is the primary parent
    pub fn parents(&self) -> &[NodeKey] {
        &self.parents
    }

    /// Ordered children
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// Attached controllers in processing order
    pub fn controllers(&self) -> &[ControllerKey] {
        &self.controllers
    }

    /// Namespace the identifier is registered in, while initialized
    pub fn namespace(&self) -> Option<NodeKey> {
        self.namespace
    }

    /// Read a property
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// All properties
    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    /// Write a property
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Borrow the behavior as a concrete class
    ///
    /// Returns `None` while the behavior is running one of its own hooks.
    pub fn behavior_as<T: NodeBehavior>(&self) -> Option<&T> {
        self.behavior.as_ref()?.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow the behavior as a concrete class
    pub fn behavior_as_mut<T: NodeBehavior>(&mut self) -> Option<&mut T> {
        self.behavior.as_mut()?.as_any_mut().downcast_mut::<T>()
    }

    pub(crate) fn primary_parent(&self) -> Option<NodeKey> {
        self.parents.first().copied()
    }
}

impl std::fmt::Debug for NodeRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRecord")
            .field("id", &self.id)
            .field("class_name", &self.class_name)
            .field("state", &self.state)
            .field("flags", &self.flags)
            .field("children", &self.children.len())
            .field("controllers", &self.controllers.len())
            .finish_non_exhaustive()
    }
}

/// View of the graph handed to a node hook
///
/// The node's own behavior is detached while its hook runs, so the context
/// can expose the whole [`Root`] mutably.
pub struct NodeContext<'a> {
    root: &'a mut Root,
    key: NodeKey,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(root: &'a mut Root, key: NodeKey) -> Self {
        Self { root, key }
    }

    /// Key of the node whose hook is running
    pub fn key(&self) -> NodeKey {
        self.key
    }

    /// Identifier of the node
    pub fn id(&self) -> &str {
        self.root.node(self.key).map_or("", NodeRecord::id)
    }

    /// Read a property of the node
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.root.node(self.key)?.property(name)
    }

    /// Write a property of the node
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        if let Some(record) = self.root.node_mut(self.key) {
            record.set_property(name, value);
        }
    }

    /// Engine-side record of the node
    pub fn record(&self) -> Option<&NodeRecord> {
        self.root.node(self.key)
    }

    /// The graph
    pub fn root(&self) -> &Root {
        self.root
    }

    /// The graph, mutably
    pub fn root_mut(&mut self) -> &mut Root {
        self.root
    }

    /// Renderer set owned by the graph
    pub fn renderers(&mut self) -> &mut Renderers {
        self.root.renderers_mut()
    }

    /// Resolve a path relative to this node's namespace
    pub fn resolve(&self, path: &str) -> Option<NodeKey> {
        let namespace = self.root.namespace_of(self.key)?;
        self.root.resolve_path(namespace, path)
    }
}
