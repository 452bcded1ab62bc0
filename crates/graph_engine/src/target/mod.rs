//! # Targets
//!
//! Weak, lazily resolved references from a node or controller to other
//! nodes or to resources. A target never keeps what it points at alive:
//! node slots hold generational keys that simply stop resolving once the
//! node is destroyed.

pub mod node_target;
pub mod resource_target;

pub use node_target::{NodeTarget, TargetSlot};
pub use resource_target::ResourceTarget;
