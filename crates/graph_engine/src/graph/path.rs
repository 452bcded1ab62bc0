//! Namespaces and identifier paths
//!
//! Every initialized node with a non-empty identifier is indexed under the
//! nearest namespace node above it. Paths are `/`-delimited identifiers
//! walked from a namespace like a filesystem path: every segment but the
//! last must name a namespace node. A leading `/` starts at the root
//! namespace. `..` is not supported.

use std::collections::HashMap;

use crate::foundation::collections::NodeKey;
use crate::graph::node::Capabilities;
use crate::graph::{GraphError, Root};

impl Root {
    /// Look up an identifier directly inside a namespace
    pub fn find_node(&self, namespace: NodeKey, id: &str) -> Option<NodeKey> {
        let key = *self.identifiers.get(&namespace)?.get(id)?;
        self.nodes.contains_key(key).then_some(key)
    }

    /// Namespace a node's own identifier lives in
    ///
    /// For the root node this is the root namespace itself. Returns `None`
    /// for nodes not connected to any namespace.
    pub fn namespace_of(&self, key: NodeKey) -> Option<NodeKey> {
        if key == self.root_node() {
            return Some(key);
        }
        let record = self.nodes.get(key)?;
        if let Some(namespace) = record.namespace {
            return Some(namespace);
        }
        let mut current = record.primary_parent();
        let mut steps = 0;
        while let Some(parent) = current {
            let parent_record = self.nodes.get(parent)?;
            if parent_record.capabilities.contains(Capabilities::NAMESPACE) {
                return Some(parent);
            }
            current = parent_record.primary_parent();
            steps += 1;
            if steps > self.config.graph.max_depth {
                return None;
            }
        }
        None
    }

    /// Resolve a path relative to a namespace
    ///
    /// Any missing segment yields `None`.
    pub fn resolve_path(&self, namespace: NodeKey, path: &str) -> Option<NodeKey> {
        let (mut current, relative) = match path.strip_prefix('/') {
            Some(rest) => (self.root_node(), rest),
            None => (namespace, path),
        };
        let mut segments = relative.split('/').filter(|segment| !segment.is_empty()).peekable();
        segments.peek()?;
        while let Some(segment) = segments.next() {
            let found = self.find_node(current, segment)?;
            if segments.peek().is_none() {
                return Some(found);
            }
            if !self.nodes.get(found)?.capabilities.contains(Capabilities::NAMESPACE) {
                return None;
            }
            current = found;
        }
        None
    }

    /// Slash-separated path of a node from the root namespace
    pub fn path_of(&self, key: NodeKey) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = key;
        while current != self.root_node() {
            let record = self.nodes.get(current)?;
            if record.id.is_empty() {
                return None;
            }
            segments.push(record.id.clone());
            current = record.namespace?;
        }
        segments.reverse();
        Some(format!("/{}", segments.join("/")))
    }

    /// Namespace children of `parent` register their identifiers in
    pub(crate) fn enclosing_namespace(&self, parent: NodeKey) -> NodeKey {
        match self.nodes.get(parent) {
            Some(record) if record.capabilities.contains(Capabilities::NAMESPACE) => parent,
            Some(record) => record.namespace.unwrap_or(self.root_node()),
            None => self.root_node(),
        }
    }

    pub(crate) fn register_identifier(
        &mut self,
        namespace: NodeKey,
        id: &str,
        key: NodeKey,
    ) -> Result<(), GraphError> {
        let index = self.identifiers.entry(namespace).or_insert_with(HashMap::new);
        match index.get(id) {
            Some(&existing) if existing != key && self.nodes.contains_key(existing) => {
                Err(GraphError::DuplicateIdentifier(id.to_string()))
            }
            _ => {
                index.insert(id.to_string(), key);
                Ok(())
            }
        }
    }

    pub(crate) fn unregister_identifier(&mut self, namespace: NodeKey, id: &str, key: NodeKey) {
        if let Some(index) = self.identifiers.get_mut(&namespace) {
            if index.get(id) == Some(&key) {
                index.remove(id);
            }
        }
    }

    /// Drop the identifier index owned by a namespace node that left the graph
    pub(crate) fn drop_namespace_index(&mut self, namespace: NodeKey) {
        if namespace != self.root_node() {
            self.identifiers.remove(&namespace);
        }
    }
}
