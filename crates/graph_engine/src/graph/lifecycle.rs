//! Init and DeInit cascades, and secondary parent links
//!
//! `init_graph` attaches an unattached subtree below a live parent and runs,
//! per node: controller PreInit, the node's own init, the children, then
//! controller PostInit. `deinit_graph` is the mirror image and finally
//! detaches the subtree from every parent.
//!
//! A failure anywhere in the subtree is recorded in [`Root::init_results`]
//! and the cascade carries on with siblings. Nodes that were visited stay
//! initialized; the caller cleans up with `deinit_graph`.

use crate::foundation::collections::NodeKey;
use crate::graph::lock::LockMode;
use crate::graph::node::{Capabilities, NodeState};
use crate::graph::{GraphError, Root};
use crate::tracker::{DeInitTracker, InitTracker, Tracker};

impl Root {
    /// Attach `node` below `parent` and initialize its subtree
    ///
    /// `index` is the position among the parent's children; `None` appends.
    /// Returns `Ok(false)` when any error diagnostic was recorded.
    pub fn init_graph(
        &mut self,
        node: NodeKey,
        parent: NodeKey,
        index: Option<usize>,
        mode: LockMode,
    ) -> Result<bool, GraphError> {
        let _guard = self.lock.enter(mode)?;

        if node == self.root_node() {
            return Err(GraphError::RootNode);
        }
        let record = self.nodes.get(node).ok_or(GraphError::StaleNode(node))?;
        if record.state != NodeState::Unattached {
            return Err(GraphError::AlreadyInitialized);
        }
        if !record.parents.is_empty() {
            return Err(GraphError::AlreadyAttached);
        }
        let parent_record = self.nodes.get(parent).ok_or(GraphError::StaleNode(parent))?;
        if parent_record.state != NodeState::Initialized {
            return Err(GraphError::ParentNotInitialized);
        }
        if self.is_ancestor_or_self(node, parent) {
            return Err(GraphError::WouldCycle);
        }

        let children = &mut self.nodes[parent].children;
        let position = index.map_or(children.len(), |index| index.min(children.len()));
        children.insert(position, node);
        self.nodes[node].parents.push(parent);

        let namespace = self.enclosing_namespace(parent);
        let mut tracker = InitTracker::new(self.take_user_data());
        self.init_node(node, namespace, &mut tracker);

        let ok = tracker.core().error_count() == 0;
        let (results, user_data) = tracker.into_core().finish();
        self.restore_user_data(user_data);
        if ok {
            log::debug!("Initialized subtree '{}'", self.nodes[node].id);
        } else {
            log::warn!(
                "Subtree '{}' initialized with {} diagnostics",
                self.nodes[node].id,
                results.len()
            );
        }
        self.init_results.extend(results);
        Ok(ok)
    }

    fn init_node(&mut self, key: NodeKey, namespace: NodeKey, tracker: &mut InitTracker) {
        let Some(record) = self.nodes.get_mut(key) else {
            return;
        };
        if record.state != NodeState::Unattached {
            return;
        }
        let id = record.id.clone();
        let previous = tracker.core_mut().enter(key, &id);

        if tracker.depth() > self.config.graph.max_depth {
            tracker.add_error(format!(
                "maximum graph depth {} exceeded; subtree skipped",
                self.config.graph.max_depth
            ));
            tracker.core_mut().leave(previous);
            return;
        }

        record_state(self, key, NodeState::Initializing);
        self.nodes[key].namespace = Some(namespace);
        let is_namespace = self.nodes[key].capabilities.contains(Capabilities::NAMESPACE);
        if is_namespace {
            self.identifiers.entry(key).or_default();
        }
        if !id.is_empty() {
            if let Err(error) = self.register_identifier(namespace, &id, key) {
                if self.config.graph.strict_identifiers {
                    tracker.add_error(error.to_string());
                } else {
                    tracker.add_warning(error.to_string());
                }
            }
        }

        let controllers = self.nodes[key].controllers.clone();
        for &controller in &controllers {
            self.controller_pre_init(controller, tracker);
        }

        let ok = self
            .with_node_behavior(key, |behavior, ctx| behavior.init(ctx, tracker))
            .unwrap_or(true);
        if !ok {
            tracker.add_error("node failed to initialize");
        }

        let child_namespace = if is_namespace { key } else { namespace };
        let children = self.nodes[key].children.clone();
        for child in children {
            if self.nodes.get(child).and_then(|record| record.primary_parent()) == Some(key) {
                self.init_node(child, child_namespace, tracker);
            }
        }

        for &controller in &controllers {
            self.controller_post_init(controller, tracker);
        }

        record_state(self, key, NodeState::Initialized);
        tracker.core_mut().leave(previous);
    }

    /// De-initialize the subtree of `node` and detach it from every parent
    ///
    /// `parent` must be the node's primary parent. Secondary links of every
    /// de-initialized node are dropped; primary links below `node` are kept
    /// so the subtree can be initialized again.
    pub fn deinit_graph(&mut self, node: NodeKey, parent: NodeKey, mode: LockMode) -> Result<bool, GraphError> {
        let _guard = self.lock.enter(mode)?;

        if node == self.root_node() {
            return Err(GraphError::RootNode);
        }
        let record = self.nodes.get(node).ok_or(GraphError::StaleNode(node))?;
        match record.state {
            NodeState::Initialized => {}
            NodeState::Unattached => return Err(GraphError::NotInitialized),
            _ => return Err(GraphError::GraphBusy),
        }
        match record.parents.iter().position(|&candidate| candidate == parent) {
            Some(0) => {}
            Some(_) => return Err(GraphError::NotPrimaryParent),
            None => return Err(GraphError::NotAChild),
        }

        let mut tracker = DeInitTracker::new(self.take_user_data());
        self.deinit_node(node, &mut tracker);

        let parents = std::mem::take(&mut self.nodes[node].parents);
        for parent in parents {
            if let Some(parent) = self.nodes.get_mut(parent) {
                parent.children.retain(|&child| child != node);
            }
        }

        let ok = tracker.core().error_count() == 0;
        let (results, user_data) = tracker.into_core().finish();
        self.restore_user_data(user_data);
        log::debug!("De-initialized subtree '{}'", self.nodes[node].id);
        self.deinit_results.extend(results);
        Ok(ok)
    }

    fn deinit_node(&mut self, key: NodeKey, tracker: &mut DeInitTracker) {
        let Some(record) = self.nodes.get(key) else {
            return;
        };
        if record.state != NodeState::Initialized {
            return;
        }
        let id = record.id.clone();
        let previous = tracker.core_mut().enter(key, &id);
        record_state(self, key, NodeState::DeInitializing);

        let controllers = self.nodes[key].controllers.clone();
        for &controller in &controllers {
            self.controller_pre_deinit(controller, tracker);
        }

        let children = self.nodes[key].children.clone();
        for &child in children.iter().rev() {
            if self.nodes.get(child).and_then(|record| record.primary_parent()) == Some(key) {
                self.deinit_node(child, tracker);
            } else {
                self.drop_link(key, child);
            }
        }

        let ok = self
            .with_node_behavior(key, |behavior, ctx| behavior.deinit(ctx, tracker))
            .unwrap_or(true);
        if !ok {
            tracker.add_error("node failed to de-initialize");
        }

        let record = &mut self.nodes[key];
        let namespace = record.namespace.take();
        let is_namespace = record.capabilities.contains(Capabilities::NAMESPACE);
        let secondary: Vec<NodeKey> = record.parents.iter().skip(1).copied().collect();
        if let Some(namespace) = namespace {
            if !id.is_empty() {
                self.unregister_identifier(namespace, &id, key);
            }
        }
        if is_namespace {
            self.drop_namespace_index(key);
        }
        for parent in secondary {
            self.drop_link(parent, key);
        }

        for &controller in &controllers {
            self.controller_post_deinit(controller, tracker);
        }

        record_state(self, key, NodeState::Unattached);
        tracker.core_mut().leave(previous);
    }

    /// Link an initialized node below a second parent
    ///
    /// The node is not initialized again; traversals visit it once per
    /// parent.
    pub fn link_node(
        &mut self,
        parent: NodeKey,
        child: NodeKey,
        index: Option<usize>,
        mode: LockMode,
    ) -> Result<(), GraphError> {
        let _guard = self.lock.enter(mode)?;

        if child == self.root_node() {
            return Err(GraphError::RootNode);
        }
        let child_record = self.nodes.get(child).ok_or(GraphError::StaleNode(child))?;
        if child_record.state != NodeState::Initialized {
            return Err(GraphError::NotInitialized);
        }
        let parent_record = self.nodes.get(parent).ok_or(GraphError::StaleNode(parent))?;
        if parent_record.state != NodeState::Initialized {
            return Err(GraphError::ParentNotInitialized);
        }
        if parent_record.children.contains(&child) {
            return Err(GraphError::AlreadyLinked);
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(GraphError::WouldCycle);
        }

        let children = &mut self.nodes[parent].children;
        let position = index.map_or(children.len(), |index| index.min(children.len()));
        children.insert(position, child);
        self.nodes[child].parents.push(parent);
        Ok(())
    }

    /// Remove a secondary parent link
    pub fn unlink_node(&mut self, parent: NodeKey, child: NodeKey, mode: LockMode) -> Result<(), GraphError> {
        let _guard = self.lock.enter(mode)?;

        let record = self.nodes.get(child).ok_or(GraphError::StaleNode(child))?;
        match record.parents.iter().position(|&candidate| candidate == parent) {
            None => Err(GraphError::NotAChild),
            Some(0) => Err(GraphError::PrimaryLink),
            Some(_) => {
                self.drop_link(parent, child);
                Ok(())
            }
        }
    }

    fn drop_link(&mut self, parent: NodeKey, child: NodeKey) {
        if let Some(record) = self.nodes.get_mut(parent) {
            record.children.retain(|&candidate| candidate != child);
        }
        if let Some(record) = self.nodes.get_mut(child) {
            record.parents.retain(|&candidate| candidate != parent);
        }
    }
}

fn record_state(root: &mut Root, key: NodeKey, state: NodeState) {
    if let Some(record) = root.nodes.get_mut(key) {
        record.state = state;
    }
}
