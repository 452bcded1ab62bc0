//! # Resources
//!
//! Loaded data the graph consumes: animations played by animation
//! controllers and graph templates instantiated by the graph factory.
//! Parsing binary resource formats is not part of this crate; resources
//! arrive as serde documents (TOML or RON) or are built in code.

pub mod animation;
pub mod graph_factory;
pub mod template;

use std::collections::HashMap;

use crate::foundation::collections::{ResourceKey, SlotMap};

pub use crate::target::ResourceTarget;
pub use animation::{Animation, AnimationClip, Keyframe};
pub use graph_factory::GraphFactory;
pub use template::{ControllerTemplate, GraphTemplate, NodeTemplate};

/// A loaded resource
#[derive(Debug, Clone)]
pub enum Resource {
    /// Keyframe animation
    Animation(Animation),
    /// Scene graph template
    Graph(GraphTemplate),
}

impl Resource {
    /// The animation, if this is one
    pub fn as_animation(&self) -> Option<&Animation> {
        match self {
            Self::Animation(animation) => Some(animation),
            Self::Graph(_) => None,
        }
    }

    /// The graph template, if this is one
    pub fn as_graph(&self) -> Option<&GraphTemplate> {
        match self {
            Self::Graph(template) => Some(template),
            Self::Animation(_) => None,
        }
    }
}

/// Named resource storage
#[derive(Debug, Default)]
pub struct ResourceSet {
    resources: SlotMap<ResourceKey, Resource>,
    names: HashMap<String, ResourceKey>,
}

impl ResourceSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a resource, replacing any resource of the same name
    ///
    /// A replaced resource gets a fresh key, so targets bound to the old one
    /// must re-resolve.
    pub fn insert(&mut self, name: impl Into<String>, resource: Resource) -> ResourceKey {
        let name = name.into();
        if let Some(old) = self.names.remove(&name) {
            self.resources.remove(old);
        }
        let key = self.resources.insert(resource);
        log::debug!("Loaded resource '{name}'");
        self.names.insert(name, key);
        key
    }

    /// Remove a resource by name
    pub fn remove(&mut self, name: &str) -> Option<Resource> {
        let key = self.names.remove(name)?;
        self.resources.remove(key)
    }

    /// Key of a named resource
    pub fn find(&self, name: &str) -> Option<ResourceKey> {
        self.names.get(name).copied()
    }

    /// Resource by key
    pub fn get(&self, key: ResourceKey) -> Option<&Resource> {
        self.resources.get(key)
    }

    /// Resource by name
    pub fn by_name(&self, name: &str) -> Option<&Resource> {
        self.get(self.find(name)?)
    }

    /// Number of resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
