//! Scene graph templates
//!
//! Serde descriptions of a subtree: node classes, identifiers, flags,
//! attributes, controllers and children. Instantiated by
//! [`GraphFactory`](super::GraphFactory).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError, ConfigFormat};
use crate::graph::Attributes;

/// Template of one controller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerTemplate {
    /// Registered controller class
    pub class: String,
    /// Attributes passed to `Controller::configure`
    pub attributes: Attributes,
}

/// Template of one node and its subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeTemplate {
    /// Registered node class
    pub class: String,
    /// Identifier within the enclosing namespace
    pub id: String,
    /// Initial active flag
    pub active: bool,
    /// Initial visible flag
    pub visible: bool,
    /// Attributes passed to `NodeBehavior::configure`
    pub attributes: Attributes,
    /// Controllers, attached in order
    pub controllers: Vec<ControllerTemplate>,
    /// Children, attached in order
    pub children: Vec<NodeTemplate>,
}

impl Default for NodeTemplate {
    fn default() -> Self {
        Self {
            class: "Group".to_string(),
            id: String::new(),
            active: true,
            visible: true,
            attributes: Attributes::new(),
            controllers: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl NodeTemplate {
    /// Template of a node of the given class
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            ..Self::default()
        }
    }

    /// Number of nodes in the subtree, this one included
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }
}

/// Template of a whole subtree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphTemplate {
    /// Top node of the subtree
    pub root: NodeTemplate,
}

impl Config for GraphTemplate {}

impl GraphTemplate {
    /// Parse a TOML template
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Self::load_from_str(contents, ConfigFormat::Toml)
    }

    /// Parse a RON template
    pub fn from_ron_str(contents: &str) -> Result<Self, ConfigError> {
        Self::load_from_str(contents, ConfigFormat::Ron)
    }

    /// Load a template, choosing the format by extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let template = Self::load_from_file(path.as_ref())?;
        log::info!(
            "Loaded graph template '{}' ({} nodes)",
            path.as_ref().display(),
            template.root.node_count()
        );
        Ok(template)
    }
}
