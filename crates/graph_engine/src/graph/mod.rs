//! # Scene Graph
//!
//! Arena-backed node graph driven by the [`Root`]. Nodes may have several
//! parents (a DAG); the first parent is the primary one and owns the node's
//! lifecycle. Structural edits of the live graph are gated by the graph lock.

pub mod builtin;
pub mod lifecycle;
pub mod lock;
pub mod node;
pub mod path;
pub mod property;
pub mod root;
pub mod traversal;

#[cfg(test)]
mod tests;

use thiserror::Error;

use crate::foundation::collections::{ControllerKey, NodeKey};
use crate::registry::RegistryError;

pub use lock::{GraphLock, LockMode, LockProbe};
pub use node::{Capabilities, NodeBehavior, NodeContext, NodeFlags, NodeRecord, NodeState};
pub use property::{AttributeExt, Attributes, PropertyValue};
pub use root::Root;

/// Graph errors
///
/// Returned by calls whose preconditions do not hold; the graph is left
/// unchanged whenever one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The node handle no longer refers to a live node
    #[error("stale node handle {0:?}")]
    StaleNode(NodeKey),

    /// The controller handle no longer refers to a live controller
    #[error("stale controller handle {0:?}")]
    StaleController(ControllerKey),

    /// The root node cannot be the subject of this call
    #[error("operation not allowed on the root node")]
    RootNode,

    /// Nodes with children cannot be destroyed
    #[error("node still has children")]
    HasChildren,

    /// The node or controller must be de-initialized first
    #[error("still initialized")]
    StillInitialized,

    /// The node or controller was never initialized
    #[error("not initialized")]
    NotInitialized,

    /// The node or controller is already initialized
    #[error("already initialized")]
    AlreadyInitialized,

    /// The node already has a parent, or the controller is already attached
    #[error("already attached")]
    AlreadyAttached,

    /// The controller must be detached first
    #[error("controller still attached")]
    StillAttached,

    /// The controller is not attached to a node
    #[error("controller not attached")]
    NotAttached,

    /// The controller is tagged with a different owner
    #[error("controller belongs to another node")]
    OwnerMismatch,

    /// The parent is part of the live graph; use `init_graph` instead
    #[error("parent is initialized")]
    ParentInitialized,

    /// The parent is not part of the live graph
    #[error("parent is not initialized")]
    ParentNotInitialized,

    /// The child is not linked under that parent
    #[error("node is not a child of the given parent")]
    NotAChild,

    /// The child is already linked under that parent
    #[error("node is already a child of the given parent")]
    AlreadyLinked,

    /// De-initialization must go through the primary parent
    #[error("given parent is not the primary parent")]
    NotPrimaryParent,

    /// Primary links are only removed by `deinit_graph`
    #[error("cannot unlink a node from its primary parent")]
    PrimaryLink,

    /// The link would make a node its own ancestor
    #[error("link would create a cycle")]
    WouldCycle,

    /// The identifier is already taken in the namespace
    #[error("identifier '{0}' already used in this namespace")]
    DuplicateIdentifier(String),

    /// A traversal or another edit holds the graph lock
    #[error("graph is locked")]
    GraphBusy,

    /// Template attributes were rejected by the node or controller class
    #[error("invalid attributes for '{class}': {message}")]
    InvalidAttributes {
        /// Class that rejected the attributes
        class: String,
        /// Reason
        message: String,
    },

    /// Class registry failure
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
