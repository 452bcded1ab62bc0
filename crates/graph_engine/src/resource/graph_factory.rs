//! Graph instantiation from templates

use crate::foundation::collections::NodeKey;
use crate::graph::{GraphError, NodeFlags, Root};
use crate::registry::ObjectFactory;
use crate::resource::template::{GraphTemplate, NodeTemplate};

/// Builds uninitialized subtrees from [`GraphTemplate`]s
///
/// The returned subtree is ready for `Root::init_graph`. If any node or
/// controller cannot be created or configured, everything created so far is
/// discarded and the error is returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphFactory;

impl GraphFactory {
    /// Instantiate a template
    pub fn create_graph(
        root: &mut Root,
        factory: &ObjectFactory,
        template: &GraphTemplate,
    ) -> Result<NodeKey, GraphError> {
        let mut created = Vec::new();
        match Self::create_node(root, factory, &template.root, &mut created) {
            Ok(key) => {
                log::debug!("Instantiated graph template with {} nodes", created.len());
                Ok(key)
            }
            Err(error) => {
                for key in created.into_iter().rev() {
                    if let Err(cleanup) = root.discard_node(key) {
                        log::warn!("Failed to discard partially built node: {cleanup}");
                    }
                }
                Err(error)
            }
        }
    }

    /// Instantiate a graph template stored in the root's resource set
    pub fn instantiate(root: &mut Root, factory: &ObjectFactory, resource: &str) -> Result<NodeKey, GraphError> {
        let template = root
            .resources()
            .by_name(resource)
            .and_then(|resource| resource.as_graph())
            .cloned()
            .ok_or_else(|| GraphError::InvalidAttributes {
                class: "GraphTemplate".to_string(),
                message: format!("graph resource '{resource}' is not loaded"),
            })?;
        Self::create_graph(root, factory, &template)
    }

    fn create_node(
        root: &mut Root,
        factory: &ObjectFactory,
        template: &NodeTemplate,
        created: &mut Vec<NodeKey>,
    ) -> Result<NodeKey, GraphError> {
        let key = root.create_node(&template.class, factory)?;
        created.push(key);

        let invalid = |message: String| GraphError::InvalidAttributes {
            class: template.class.clone(),
            message,
        };
        let record = root.node_mut(key).ok_or(GraphError::StaleNode(key))?;
        record.id = template.id.clone();
        record.flags.set(NodeFlags::ACTIVE, template.active);
        record.flags.set(NodeFlags::VISIBLE, template.visible);
        if let Some(behavior) = record.behavior.as_mut() {
            behavior.configure(&template.attributes).map_err(invalid)?;
        }

        for controller in &template.controllers {
            let controller_key = root.create_controller(&controller.class, key, factory)?;
            let configured = root
                .controller_mut(controller_key)
                .ok_or(GraphError::StaleController(controller_key))?
                .configure(&controller.attributes);
            if let Err(message) = configured {
                root.destroy_controller(controller_key)?;
                return Err(GraphError::InvalidAttributes {
                    class: controller.class.clone(),
                    message,
                });
            }
            root.add_controller(key, controller_key)?;
        }

        for child in &template.children {
            let child_key = Self::create_node(root, factory, child, created)?;
            root.attach_child(key, child_key)?;
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::FacetKind;
    use crate::graph::LockMode;
    use crate::registry::RegistryError;
    use crate::resource::template::ControllerTemplate;

    fn template() -> GraphTemplate {
        let mut clock = NodeTemplate::new("Timeline");
        clock.id = "clock".into();
        let mut spinner = NodeTemplate::new("Transform");
        spinner.id = "spinner".into();
        spinner.controllers.push(ControllerTemplate {
            class: "UniformTimeController".into(),
            attributes: Default::default(),
        });
        clock.children.push(spinner);
        let mut top = NodeTemplate::new("Namespace");
        top.id = "level".into();
        top.children.push(clock);
        GraphTemplate { root: top }
    }

    #[test]
    fn test_create_and_init_template() {
        let mut root = Root::default();
        let factory = ObjectFactory::with_builtins();
        let top = GraphFactory::create_graph(&mut root, &factory, &template()).unwrap();
        assert!(!root.is_initialized(top));

        let parent = root.root_node();
        assert!(root.init_graph(top, parent, None, LockMode::Acquire).unwrap());
        let spinner = root.resolve_path(parent, "level/spinner").unwrap();
        let controller = root.node(spinner).unwrap().controllers()[0];
        assert!(root.controller(controller).unwrap().facet(FacetKind::Uniform));
        assert!(root.controller(controller).unwrap().is_initialized());
    }

    #[test]
    fn test_unknown_class_discards_partial_graph() {
        let mut root = Root::default();
        let factory = ObjectFactory::with_builtins();
        let mut broken = template();
        broken.root.children[0].children.push(NodeTemplate::new("Teapot"));
        let before = root.node_count();

        let error = GraphFactory::create_graph(&mut root, &factory, &broken).unwrap_err();
        assert!(matches!(error, GraphError::Registry(RegistryError::UnknownClass { .. })));
        assert_eq!(root.node_count(), before);
    }
}
