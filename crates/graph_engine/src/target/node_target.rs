//! Node targets

use crate::foundation::collections::NodeKey;
use crate::graph::builtin::ReferenceNode;
use crate::graph::{Capabilities, NodeBehavior, Root};

/// What a slot was bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSlot {
    /// Identifier path, resolved against a namespace
    Path(String),
    /// Direct node handle
    Direct(NodeKey),
}

/// A capability-checked, possibly multi-valued node reference
#[derive(Debug, Clone)]
pub struct NodeTarget {
    required: Capabilities,
    slots: Vec<TargetSlot>,
    resolved: Vec<Option<NodeKey>>,
}

impl Default for NodeTarget {
    fn default() -> Self {
        Self::new(Capabilities::empty())
    }
}

impl NodeTarget {
    /// Create an empty target whose nodes must carry `required`
    pub fn new(required: Capabilities) -> Self {
        Self {
            required,
            slots: Vec::new(),
            resolved: Vec::new(),
        }
    }

    /// Capabilities a node must declare to be handed out
    pub fn required(&self) -> Capabilities {
        self.required
    }

    /// Add a path slot; it stays unresolved until the next `resolve`
    pub fn add_path(&mut self, path: impl Into<String>) {
        self.slots.push(TargetSlot::Path(path.into()));
        self.resolved.push(None);
    }

    /// Add a direct slot
    pub fn add_node(&mut self, key: NodeKey) {
        self.slots.push(TargetSlot::Direct(key));
        self.resolved.push(Some(key));
    }

    /// Remove all slots
    pub fn clear(&mut self) {
        self.slots.clear();
        self.resolved.clear();
    }

    /// Drop resolved keys of path slots, keeping the slots
    pub fn invalidate(&mut self) {
        for (slot, resolved) in self.slots.iter().zip(&mut self.resolved) {
            if matches!(slot, TargetSlot::Path(_)) {
                *resolved = None;
            }
        }
    }

    /// Slots
    pub fn slots(&self) -> &[TargetSlot] {
        &self.slots
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the target has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Resolve every slot against `namespace`
    ///
    /// Returns the number of slots that resolved to a node passing the
    /// capability check.
    pub fn resolve(&mut self, root: &Root, namespace: NodeKey) -> usize {
        self.resolved = self
            .slots
            .iter()
            .map(|slot| match slot {
                TargetSlot::Path(path) => root.resolve_path(namespace, path),
                TargetSlot::Direct(key) => root.contains_node(*key).then_some(*key),
            })
            .collect();
        self.count_valid(root)
    }

    /// Resolve every slot to a Reference node and follow it one level
    ///
    /// Slots naming anything but a Reference node resolve to nothing.
    pub fn resolve_reference(&mut self, root: &Root, namespace: NodeKey) -> usize {
        self.resolve(root, namespace);
        self.resolved = self
            .resolved
            .iter()
            .map(|key| key.and_then(|key| root.follow_reference(key)))
            .collect();
        self.count_valid(root)
    }

    fn count_valid(&self, root: &Root) -> usize {
        (0..self.slots.len()).filter(|&index| self.get_node(root, index).is_some()).count()
    }

    /// The node in a slot
    ///
    /// `None` when the slot is unresolved, the node was destroyed, or the
    /// node lacks the required capabilities.
    pub fn get_node(&self, root: &Root, index: usize) -> Option<NodeKey> {
        let key = (*self.resolved.get(index)?)?;
        self.can_reference(root, key).then_some(key)
    }

    /// All nodes currently passing the checks, in slot order
    pub fn get_nodes(&self, root: &Root) -> Vec<NodeKey> {
        (0..self.slots.len()).filter_map(|index| self.get_node(root, index)).collect()
    }

    /// The behavior of the node in a slot as a concrete class
    pub fn get_as<'a, T: NodeBehavior>(&self, root: &'a Root, index: usize) -> Option<&'a T> {
        let key = self.get_node(root, index)?;
        root.node(key)?.behavior_as::<T>()
    }

    /// Whether `key` could be bound to this target
    pub fn can_reference(&self, root: &Root, key: NodeKey) -> bool {
        root.node(key)
            .is_some_and(|record| record.capabilities().contains(self.required))
    }

    /// Whether `key` is a Reference node whose own target could be bound here
    pub fn can_resolve_reference(&self, root: &Root, key: NodeKey) -> bool {
        root.follow_reference(key)
            .is_some_and(|followed| self.can_reference(root, followed))
    }
}

impl Root {
    /// Follow a Reference node one level
    ///
    /// Returns `None` if `key` is not a Reference node or its own target
    /// does not resolve.
    pub fn follow_reference(&self, key: NodeKey) -> Option<NodeKey> {
        let record = self.node(key)?;
        if !record.capabilities().contains(Capabilities::REFERENCE) {
            return None;
        }
        record.behavior_as::<ReferenceNode>()?.target().get_node(self, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builtin::{CameraNode, GroupNode};
    use crate::graph::LockMode;

    fn live(root: &mut Root, id: &str, behavior: Box<dyn NodeBehavior>) -> NodeKey {
        let key = root.create_node_with("Test", behavior);
        root.set_node_id(key, id).unwrap();
        let parent = root.root_node();
        assert!(root.init_graph(key, parent, None, LockMode::Acquire).unwrap());
        key
    }

    #[test]
    fn test_capability_check_never_widens() {
        let mut root = Root::default();
        let group = live(&mut root, "group", Box::new(GroupNode));
        let camera = live(&mut root, "camera", Box::new(CameraNode::default()));

        let mut target = NodeTarget::new(Capabilities::CAMERA);
        target.add_path("group");
        target.add_path("camera");
        assert_eq!(target.resolve(&root, root.root_node()), 1);
        assert_eq!(target.get_node(&root, 0), None);
        assert_eq!(target.get_node(&root, 1), Some(camera));
        assert!(!target.can_reference(&root, group));
        assert!(target.get_as::<CameraNode>(&root, 1).is_some());
        assert!(target.get_as::<GroupNode>(&root, 1).is_none());
    }

    #[test]
    fn test_direct_slot_goes_stale() {
        let mut root = Root::default();
        let group = live(&mut root, "group", Box::new(GroupNode));
        let mut target = NodeTarget::default();
        target.add_node(group);
        assert_eq!(target.get_nodes(&root), vec![group]);

        let parent = root.root_node();
        assert!(root.deinit_graph(group, parent, LockMode::Acquire).unwrap());
        root.destroy_node(group).unwrap();
        assert_eq!(target.get_node(&root, 0), None);
        assert_eq!(target.resolve(&root, root.root_node()), 0);
    }

    #[test]
    fn test_missing_path_resolves_to_none() {
        let root = Root::default();
        let mut target = NodeTarget::default();
        target.add_path("nowhere/at/all");
        assert_eq!(target.resolve(&root, root.root_node()), 0);
        assert_eq!(target.get_node(&root, 0), None);
        assert_eq!(target.get_node(&root, 7), None);
    }
}
