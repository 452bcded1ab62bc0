//! Node and controller factory
//!
//! Bundles the node-class and controller-class registries and knows the
//! built-in classes.

use crate::controller::{
    AnimationFacet, Controller, ControllerBehavior, FacetController, Facets, LinkFacet, NodeLinkFacet,
    TimeFacet, UniformFacet, VariableFacet, WaveFacet,
};
use crate::graph::builtin::{
    BodyNode, CameraNode, DrawableNode, GroupNode, IslandNode, ListenerNode, NamespaceNode, ReferenceNode,
    SoundNode, TimelineNode, TransformNode,
};
use crate::graph::NodeBehavior;
use crate::registry::{ClassInfo, FactoryRegistry, RegistryError};

/// Node-class and controller-class registries
#[derive(Debug)]
pub struct ObjectFactory {
    nodes: FactoryRegistry<Box<dyn NodeBehavior>>,
    controllers: FactoryRegistry<Controller>,
}

impl Default for ObjectFactory {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ObjectFactory {
    /// Factory with no registered classes
    pub fn new() -> Self {
        Self {
            nodes: FactoryRegistry::new("node"),
            controllers: FactoryRegistry::new("controller"),
        }
    }

    /// Factory with every built-in node and controller class
    pub fn with_builtins() -> Self {
        let mut factory = Self::new();
        factory.register_builtin_nodes();
        factory.register_builtin_controllers();
        log::debug!(
            "Registered {} node classes and {} controller classes",
            factory.nodes.len(),
            factory.controllers.len()
        );
        factory
    }

    fn register_builtin_nodes(&mut self) {
        let builtins: [(&str, fn() -> Box<dyn NodeBehavior>); 11] = [
            ("Group", || Box::new(GroupNode)),
            ("Namespace", || Box::new(NamespaceNode)),
            ("Reference", || Box::<ReferenceNode>::default()),
            ("Timeline", || Box::<TimelineNode>::default()),
            ("Transform", || Box::<TransformNode>::default()),
            ("Camera", || Box::<CameraNode>::default()),
            ("Listener", || Box::<ListenerNode>::default()),
            ("Island", || Box::<IslandNode>::default()),
            ("Drawable", || Box::<DrawableNode>::default()),
            ("Sound", || Box::<SoundNode>::default()),
            ("Body", || Box::<BodyNode>::default()),
        ];
        for (name, constructor) in builtins {
            if let Err(error) = self.nodes.register(ClassInfo::new(name, constructor)) {
                log::warn!("{error}");
            }
        }
    }

    fn register_builtin_controllers(&mut self) {
        let builtins: [(&str, fn() -> Facets); 8] = [
            ("Controller", Facets::new),
            ("TimeController", || Facets::new().with_time(TimeFacet::new())),
            ("AnimationTimeController", || {
                Facets::new()
                    .with_time(TimeFacet::new())
                    .with_animation(AnimationFacet::default())
            }),
            ("UniformTimeController", || {
                Facets::new()
                    .with_time(TimeFacet::new())
                    .with_uniform(UniformFacet::default())
            }),
            ("WaveUniformTimeController", || {
                Facets::new()
                    .with_time(TimeFacet::new())
                    .with_uniform(UniformFacet::default())
                    .with_wave(WaveFacet::default())
            }),
            ("VariableController", || Facets::new().with_variable(VariableFacet::new())),
            ("LinkController", || Facets::new().with_link(LinkFacet::default())),
            ("NodeLinkController", || Facets::new().with_node_link(NodeLinkFacet::default())),
        ];
        for (name, facets) in builtins {
            let info = ClassInfo::new(name, move || Controller::new(name, facets(), Box::new(FacetController)));
            if let Err(error) = self.controllers.register(info) {
                log::warn!("{error}");
            }
        }
    }

    /// Register a node class
    pub fn register_node_class<B>(
        &mut self,
        name: &str,
        constructor: impl Fn() -> B + Send + Sync + 'static,
    ) -> Result<usize, RegistryError>
    where
        B: NodeBehavior,
    {
        self.nodes
            .register(ClassInfo::new(name, move || Box::new(constructor()) as Box<dyn NodeBehavior>))
    }

    /// Unregister a node class
    pub fn unregister_node_class(&mut self, name: &str) -> Result<(), RegistryError> {
        self.nodes.unregister(name).map(drop)
    }

    /// Index of a node class, `-1` if unknown
    pub fn node_class_index(&self, name: &str) -> i32 {
        self.nodes.registered_index_or_sentinel(name)
    }

    /// Register a controller class from a facet set and a behavior
    pub fn register_controller_class<B>(
        &mut self,
        name: &str,
        facets: impl Fn() -> Facets + Send + Sync + 'static,
        behavior: impl Fn() -> B + Send + Sync + 'static,
    ) -> Result<usize, RegistryError>
    where
        B: ControllerBehavior,
    {
        let class = name.to_string();
        self.controllers.register(ClassInfo::new(name, move || {
            Controller::new(class.clone(), facets(), Box::new(behavior()))
        }))
    }

    /// Unregister a controller class
    pub fn unregister_controller_class(&mut self, name: &str) -> Result<(), RegistryError> {
        self.controllers.unregister(name).map(drop)
    }

    /// Index of a controller class, `-1` if unknown
    pub fn controller_class_index(&self, name: &str) -> i32 {
        self.controllers.registered_index_or_sentinel(name)
    }

    /// Node class registry
    pub fn node_classes(&self) -> &FactoryRegistry<Box<dyn NodeBehavior>> {
        &self.nodes
    }

    /// Controller class registry
    pub fn controller_classes(&self) -> &FactoryRegistry<Controller> {
        &self.controllers
    }

    /// Instantiate a node behavior by class name
    pub fn create_node(&self, class: &str) -> Result<Box<dyn NodeBehavior>, RegistryError> {
        self.nodes.create(class)
    }

    /// Instantiate a detached, owner-less controller by class name
    pub fn create_controller(&self, class: &str) -> Result<Controller, RegistryError> {
        self.controllers.create(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::FacetKind;
    use crate::graph::Capabilities;

    #[test]
    fn test_builtins_registered() {
        let factory = ObjectFactory::with_builtins();
        assert_eq!(factory.node_class_index("Group"), 0);
        assert_eq!(factory.node_classes().len(), 11);
        assert_eq!(factory.controller_classes().len(), 8);
        let reference = factory.create_node("Reference").unwrap();
        assert!(reference.capabilities().contains(Capabilities::REFERENCE));
    }

    #[test]
    fn test_controller_classes_carry_facets() {
        let factory = ObjectFactory::with_builtins();
        let wave = factory.create_controller("WaveUniformTimeController").unwrap();
        assert_eq!(wave.class_name(), "WaveUniformTimeController");
        assert!(wave.facet(FacetKind::Time));
        assert!(wave.facet(FacetKind::Uniform));
        assert!(wave.facet(FacetKind::Wave));
        assert!(!wave.facet(FacetKind::Link));
        assert!(factory.create_controller("Controller").unwrap().facets().kinds().is_empty());
    }

    #[test]
    fn test_custom_node_class_round_trip() {
        let mut factory = ObjectFactory::new();
        assert_eq!(factory.node_class_index("Group"), -1);
        assert_eq!(factory.register_node_class("Group", || GroupNode).unwrap(), 0);
        assert!(factory.node_class_index("Group") >= 0);
        factory.unregister_node_class("Group").unwrap();
        assert_eq!(factory.node_class_index("Group"), -1);
    }
}
