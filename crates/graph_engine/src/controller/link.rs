//! Link facets
//!
//! Both facets follow a [`NodeTarget`] to another node: the link facet copies
//! properties from it into the owner, the node link facet mirrors its
//! participation flags.

use crate::graph::{AttributeExt, Attributes, Capabilities, NodeFlags};
use crate::target::NodeTarget;

/// Property link controller state
#[derive(Debug, Clone, Default)]
pub struct LinkFacet {
    /// Source node
    pub target: NodeTarget,
    /// `(source property, owner property)` pairs
    pub properties: Vec<(String, String)>,
}

impl LinkFacet {
    /// Link to the node at `path`
    pub fn new(path: impl Into<String>) -> Self {
        let mut target = NodeTarget::new(Capabilities::empty());
        target.add_path(path);
        Self {
            target,
            properties: Vec::new(),
        }
    }

    /// Copy `source` of the linked node into `destination` of the owner
    pub fn with_property(mut self, source: impl Into<String>, destination: impl Into<String>) -> Self {
        self.properties.push((source.into(), destination.into()));
        self
    }

    /// `target` is a node path; `properties` is a comma separated list of
    /// `name` or `source:destination` entries
    pub(crate) fn configure(&mut self, attributes: &Attributes) -> Result<(), String> {
        if let Some(path) = attributes.text("target")? {
            self.target.clear();
            self.target.add_path(path);
        }
        if let Some(list) = attributes.text("properties")? {
            self.properties = list
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(|entry| match entry.split_once(':') {
                    Some((source, destination)) => (source.trim().to_string(), destination.trim().to_string()),
                    None => (entry.to_string(), entry.to_string()),
                })
                .collect();
        }
        Ok(())
    }
}

/// Which flags a node link mirrors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeLinkMode {
    /// Mirror the active flag
    Active,
    /// Mirror the visible flag
    Visible,
    /// Mirror both flags
    #[default]
    Both,
}

impl NodeLinkMode {
    /// Flags covered by the mode
    pub fn flags(self) -> NodeFlags {
        match self {
            Self::Active => NodeFlags::ACTIVE,
            Self::Visible => NodeFlags::VISIBLE,
            Self::Both => NodeFlags::ACTIVE | NodeFlags::VISIBLE,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "visible" => Some(Self::Visible),
            "both" => Some(Self::Both),
            _ => None,
        }
    }
}

/// Node link controller state
///
/// Mirroring runs in the owner's logic step, so an owner whose active flag
/// was cleared by the link stops being re-evaluated until something else
/// re-activates it.
#[derive(Debug, Clone, Default)]
pub struct NodeLinkFacet {
    /// Linked node
    pub target: NodeTarget,
    /// Flags to mirror
    pub mode: NodeLinkMode,
    /// Mirror the inverted flags
    pub invert: bool,
}

impl NodeLinkFacet {
    /// Mirror the flags of the node at `path`
    pub fn new(path: impl Into<String>, mode: NodeLinkMode) -> Self {
        let mut target = NodeTarget::new(Capabilities::empty());
        target.add_path(path);
        Self {
            target,
            mode,
            invert: false,
        }
    }

    /// Owner flags after mirroring `source`
    pub fn mirror(&self, owner: NodeFlags, source: NodeFlags) -> NodeFlags {
        let mask = self.mode.flags();
        let mirrored = if self.invert { !source & mask } else { source & mask };
        (owner - mask) | mirrored
    }

    pub(crate) fn configure(&mut self, attributes: &Attributes) -> Result<(), String> {
        if let Some(path) = attributes.text("target")? {
            self.target.clear();
            self.target.add_path(path);
        }
        if let Some(mode) = attributes.text("mode")? {
            self.mode = NodeLinkMode::from_name(mode).ok_or_else(|| format!("unknown node link mode '{mode}'"))?;
        }
        self.invert = attributes.bool_or("invert", self.invert)?;
        Ok(())
    }
}
