//! # Controllers
//!
//! Controllers are per-node behavior units owned by exactly one node. The
//! traversal engine calls their Pre/Post hooks around the owner's own hooks,
//! filtered by per-traversal response masks.
//!
//! Specialised controller kinds (time, animation, uniform, wave, variable,
//! link, node link) are expressed as [`facet`]s attached to a plain
//! [`Controller`] record rather than as subtypes; callers ask a controller
//! which facets it carries.

pub mod evaluator;
pub mod facet;
pub mod link;
pub mod process;
pub mod time;
pub mod variable;

use std::any::Any;

use crate::foundation::collections::{ControllerKey, NodeKey};
use crate::graph::{AttributeExt, Attributes, NodeRecord, PropertyValue, Root};
use crate::tracker::{
    ConfigChangedTracker, DeInitTracker, InitTracker, InputTracker, LogicTracker, OutputTracker,
    TraversalMask,
};

pub use evaluator::{ClipSample, KeyframeEvaluator, TimeEvaluator, UniformTimeEvaluator, WaveEvaluator, WaveShape};
pub use facet::{AnimationFacet, FacetKind, Facets, UniformFacet, WaveFacet};
pub use link::{LinkFacet, NodeLinkFacet, NodeLinkMode};
pub use time::TimeFacet;
pub use variable::VariableFacet;

/// Lifecycle state of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControllerState {
    /// Not initialized
    #[default]
    Uninitialized,
    /// PreInit ran, PostInit pending
    Initializing,
    /// Live
    Initialized,
    /// PreDeInit ran, PostDeInit pending
    DeInitializing,
}

/// Response masks per traversal kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Responses {
    /// Config-changed traversals
    pub config_changed: TraversalMask,
    /// Logic traversals
    pub logic: TraversalMask,
    /// Input traversals
    pub input: TraversalMask,
    /// Output traversals
    pub output: TraversalMask,
}

impl Responses {
    /// Respond to every trigger group of every traversal kind
    pub fn all() -> Self {
        Self {
            config_changed: TraversalMask::all(),
            logic: TraversalMask::all(),
            input: TraversalMask::all(),
            output: TraversalMask::all(),
        }
    }

    /// Respond to nothing
    pub fn none() -> Self {
        Self {
            config_changed: TraversalMask::empty(),
            logic: TraversalMask::empty(),
            input: TraversalMask::empty(),
            output: TraversalMask::empty(),
        }
    }
}

/// Class-specific controller hooks
///
/// All hooks default to no-ops. Built-in facets run before the Pre hooks and
/// before the Post hooks of the same phase.
#[allow(unused_variables)]
pub trait ControllerBehavior: Any + Send {
    /// Before the owner initializes
    fn pre_init(&mut self, ctx: &mut ControllerContext<'_>, tracker: &mut InitTracker) -> bool {
        true
    }

    /// After the owner and its children initialized
    fn post_init(&mut self, ctx: &mut ControllerContext<'_>, tracker: &mut InitTracker) -> bool {
        true
    }

    /// Before the owner's children de-initialize
    fn pre_deinit(&mut self, ctx: &mut ControllerContext<'_>, tracker: &mut DeInitTracker) -> bool {
        true
    }

    /// After the owner de-initialized
    fn post_deinit(&mut self, ctx: &mut ControllerContext<'_>, tracker: &mut DeInitTracker) -> bool {
        true
    }

    /// Config-changed, before the owner
    fn pre_config_changed(&mut self, ctx: &mut ControllerContext<'_>, tracker: &mut ConfigChangedTracker) {}

    /// Config-changed, after the owner's subtree
    fn post_config_changed(&mut self, ctx: &mut ControllerContext<'_>, tracker: &mut ConfigChangedTracker) {}

    /// Logic, before the owner
    fn pre_logic(&mut self, ctx: &mut ControllerContext<'_>, tracker: &mut LogicTracker) {}

    /// Logic, after the owner's subtree
    fn post_logic(&mut self, ctx: &mut ControllerContext<'_>, tracker: &mut LogicTracker) {}

    /// Input, before the owner
    fn pre_input(&mut self, ctx: &mut ControllerContext<'_>, tracker: &mut InputTracker) {}

    /// Input, after the owner's subtree
    fn post_input(&mut self, ctx: &mut ControllerContext<'_>, tracker: &mut InputTracker) {}

    /// Output, before the owner
    fn pre_output(&mut self, ctx: &mut ControllerContext<'_>, tracker: &mut OutputTracker) {}

    /// Output, after the owner's subtree
    fn post_output(&mut self, ctx: &mut ControllerContext<'_>, tracker: &mut OutputTracker) {}

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Behavior of the built-in controller classes; all work happens in facets
#[derive(Debug, Default)]
pub struct FacetController;

impl ControllerBehavior for FacetController {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A controller record
pub struct Controller {
    pub(crate) class_name: String,
    pub(crate) owner: NodeKey,
    pub(crate) attached: bool,
    pub(crate) state: ControllerState,
    pub(crate) responses: Responses,
    pub(crate) facets: Facets,
    pub(crate) behavior: Option<Box<dyn ControllerBehavior>>,
}

impl Controller {
    /// Create a detached, owner-less controller
    pub fn new(class_name: impl Into<String>, facets: Facets, behavior: Box<dyn ControllerBehavior>) -> Self {
        Self {
            class_name: class_name.into(),
            owner: NodeKey::default(),
            attached: false,
            state: ControllerState::Uninitialized,
            responses: Responses::default(),
            facets,
            behavior: Some(behavior),
        }
    }

    /// Registered class name
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Owner tag; set at creation, changeable only while detached and uninitialized
    pub fn owner(&self) -> NodeKey {
        self.owner
    }

    /// Whether the controller sits in its owner's controller list
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Lifecycle state
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Whether the controller is initialized
    pub fn is_initialized(&self) -> bool {
        self.state == ControllerState::Initialized
    }

    /// Response masks
    pub fn responses(&self) -> Responses {
        self.responses
    }

    /// Replace the response masks
    pub fn set_responses(&mut self, responses: Responses) {
        self.responses = responses;
    }

    /// Facets carried by the controller
    pub fn facets(&self) -> &Facets {
        &self.facets
    }

    /// Facets carried by the controller, mutably
    pub fn facets_mut(&mut self) -> &mut Facets {
        &mut self.facets
    }

    /// Whether the controller carries a facet
    pub fn facet(&self, kind: FacetKind) -> bool {
        self.facets.has(kind)
    }

    /// Time facet
    pub fn time(&self) -> Option<&TimeFacet> {
        self.facets.time.as_ref()
    }

    /// Time facet, mutably
    pub fn time_mut(&mut self) -> Option<&mut TimeFacet> {
        self.facets.time.as_mut()
    }

    /// Animation facet
    pub fn animation(&self) -> Option<&AnimationFacet> {
        self.facets.animation.as_ref()
    }

    /// Uniform facet
    pub fn uniform(&self) -> Option<&UniformFacet> {
        self.facets.uniform.as_ref()
    }

    /// Wave facet
    pub fn wave(&self) -> Option<&WaveFacet> {
        self.facets.wave.as_ref()
    }

    /// Variable facet
    pub fn variable(&self) -> Option<&VariableFacet> {
        self.facets.variable.as_ref()
    }

    /// Variable facet, mutably
    pub fn variable_mut(&mut self) -> Option<&mut VariableFacet> {
        self.facets.variable.as_mut()
    }

    /// Link facet
    pub fn link(&self) -> Option<&LinkFacet> {
        self.facets.link.as_ref()
    }

    /// Link facet, mutably
    pub fn link_mut(&mut self) -> Option<&mut LinkFacet> {
        self.facets.link.as_mut()
    }

    /// Node link facet
    pub fn node_link(&self) -> Option<&NodeLinkFacet> {
        self.facets.node_link.as_ref()
    }

    /// Node link facet, mutably
    pub fn node_link_mut(&mut self) -> Option<&mut NodeLinkFacet> {
        self.facets.node_link.as_mut()
    }

    /// Borrow the behavior as a concrete type
    pub fn behavior_as<T: ControllerBehavior>(&self) -> Option<&T> {
        self.behavior.as_ref()?.as_any().downcast_ref::<T>()
    }

    /// Apply template attributes
    ///
    /// `config_response`, `logic_response`, `input_response` and
    /// `output_response` set the response masks; the remaining keys are
    /// interpreted by the facets.
    pub fn configure(&mut self, attributes: &Attributes) -> Result<(), String> {
        let mask = |key: &str, current: TraversalMask| -> Result<TraversalMask, String> {
            let bits = attributes.int_or(key, i64::from(current.bits()))?;
            u32::try_from(bits)
                .map(TraversalMask::from_bits_retain)
                .map_err(|_| format!("attribute '{key}' must fit in 32 bits"))
        };
        self.responses = Responses {
            config_changed: mask("config_response", self.responses.config_changed)?,
            logic: mask("logic_response", self.responses.logic)?,
            input: mask("input_response", self.responses.input)?,
            output: mask("output_response", self.responses.output)?,
        };
        self.facets.configure(attributes)
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("class_name", &self.class_name)
            .field("owner", &self.owner)
            .field("attached", &self.attached)
            .field("state", &self.state)
            .field("facets", &self.facets.kinds())
            .finish_non_exhaustive()
    }
}

/// View of the graph handed to a controller hook
pub struct ControllerContext<'a> {
    root: &'a mut Root,
    key: ControllerKey,
    owner: NodeKey,
}

impl<'a> ControllerContext<'a> {
    pub(crate) fn new(root: &'a mut Root, key: ControllerKey, owner: NodeKey) -> Self {
        Self { root, key, owner }
    }

    /// Key of the running controller
    pub fn key(&self) -> ControllerKey {
        self.key
    }

    /// Owner node
    pub fn owner(&self) -> NodeKey {
        self.owner
    }

    /// Owner node record
    pub fn owner_record(&self) -> Option<&NodeRecord> {
        self.root.node(self.owner)
    }

    /// Read a property of the owner
    pub fn owner_property(&self, name: &str) -> Option<&PropertyValue> {
        self.root.node(self.owner)?.property(name)
    }

    /// Write a property of the owner
    pub fn set_owner_property(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        if let Some(owner) = self.root.node_mut(self.owner) {
            owner.set_property(name, value);
        }
    }

    /// Facets of the running controller
    pub fn facets(&self) -> Option<&Facets> {
        self.root.controller(self.key).map(Controller::facets)
    }

    /// The graph
    pub fn root(&self) -> &Root {
        self.root
    }

    /// The graph, mutably
    pub fn root_mut(&mut self) -> &mut Root {
        self.root
    }
}
