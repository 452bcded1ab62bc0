use std::any::Any;
use std::thread;

use approx::assert_relative_eq;

use crate::controller::{
    AnimationFacet, Controller, ControllerBehavior, ControllerContext, ControllerState, FacetController, Facets,
    Responses, TimeFacet,
};
use crate::core::EngineConfig;
use crate::foundation::collections::{ControllerKey, NodeKey};
use crate::graph::builtin::{DrawableNode, GroupNode, TimelineNode};
use crate::graph::{GraphError, LockMode, NodeBehavior, NodeContext, PropertyValue, Root};
use crate::registry::ObjectFactory;
use crate::render::SuspensionPolicy;
use crate::resource::{Animation, AnimationClip, Keyframe, Resource};
use crate::target::NodeTarget;
use crate::tracker::{FrameTime, InputEvent, InputTracker, LogicTracker, TraversalMask};

#[derive(Debug, Default)]
struct Probe {
    processed: u32,
    finished: u32,
    cancel: bool,
    consumes: Option<&'static str>,
}

impl NodeBehavior for Probe {
    fn process_logic(&mut self, _ctx: &mut NodeContext<'_>, tracker: &mut LogicTracker) {
        self.processed += 1;
        if self.cancel {
            tracker.cancel_finish();
        }
    }

    fn finish_logic(&mut self, _ctx: &mut NodeContext<'_>, _tracker: &mut LogicTracker) {
        self.finished += 1;
    }

    fn process_input(&mut self, _ctx: &mut NodeContext<'_>, tracker: &mut InputTracker) {
        if let Some(name) = self.consumes {
            tracker.consume(name);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Default)]
struct Counting {
    pre_logic: u32,
    post_logic: u32,
}

impl ControllerBehavior for Counting {
    fn pre_logic(&mut self, _ctx: &mut ControllerContext<'_>, _tracker: &mut LogicTracker) {
        self.pre_logic += 1;
    }

    fn post_logic(&mut self, _ctx: &mut ControllerContext<'_>, _tracker: &mut LogicTracker) {
        self.post_logic += 1;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn live(root: &mut Root, parent: NodeKey, id: &str, behavior: Box<dyn NodeBehavior>) -> NodeKey {
    let node = root.create_node_with("Test", behavior);
    root.set_node_id(node, id).unwrap();
    assert!(root.init_graph(node, parent, None, LockMode::Acquire).unwrap());
    node
}

fn live_group(root: &mut Root, id: &str) -> NodeKey {
    let parent = root.root_node();
    live(root, parent, id, Box::new(GroupNode))
}

fn probe(root: &Root, node: NodeKey) -> &Probe {
    root.node(node).unwrap().behavior_as::<Probe>().unwrap()
}

fn counting(root: &Root, controller: ControllerKey) -> &Counting {
    root.controller(controller).unwrap().behavior_as::<Counting>().unwrap()
}

fn logic(root: &mut Root, delta: f64, trigger: TraversalMask) {
    let time = FrameTime {
        current: delta,
        delta,
        frame: 1,
    };
    root.process_logic(time, trigger).unwrap();
}

#[test]
fn test_group_lifecycle() {
    let factory = ObjectFactory::with_builtins();
    assert_eq!(factory.node_class_index("Group"), 0);

    let mut root = Root::default();
    let node = root.create_node("Group", &factory).unwrap();
    let parent = root.root_node();
    assert!(root.init_graph(node, parent, None, LockMode::Acquire).unwrap());
    assert!(root.init_results().is_empty());

    assert_eq!(root.destroy_node(node), Err(GraphError::StillInitialized));
    assert!(root.deinit_graph(node, parent, LockMode::Acquire).unwrap());
    root.destroy_node(node).unwrap();
    assert!(!root.contains_node(node));
    assert!(root.children(parent).is_empty());
}

#[test]
fn test_deinit_requires_initialized_node() {
    let mut root = Root::default();
    let node = root.create_node_with("Group", Box::new(GroupNode));
    let parent = root.root_node();
    assert_eq!(
        root.deinit_graph(node, parent, LockMode::Acquire),
        Err(GraphError::NotInitialized)
    );

    for _ in 0..2 {
        assert!(root.init_graph(node, parent, None, LockMode::Acquire).unwrap());
        assert!(root.is_initialized(node));
        assert_eq!(
            root.init_graph(node, parent, None, LockMode::Acquire),
            Err(GraphError::AlreadyInitialized)
        );
        assert!(root.deinit_graph(node, parent, LockMode::Acquire).unwrap());
        assert!(!root.is_initialized(node));
    }
}

#[test]
fn test_init_inserts_at_index() {
    let mut root = Root::default();
    let parent = root.root_node();
    let a = live_group(&mut root, "a");
    let b = live_group(&mut root, "b");
    let first = root.create_node_with("Group", Box::new(GroupNode));
    assert!(root.init_graph(first, parent, Some(0), LockMode::Acquire).unwrap());
    let last = root.create_node_with("Group", Box::new(GroupNode));
    assert!(root.init_graph(last, parent, Some(99), LockMode::Acquire).unwrap());
    assert_eq!(root.children(parent), &[first, a, b, last]);
}

#[test]
fn test_cascade_initializes_subtree_in_order() {
    let mut root = Root::default();
    let parent = root.root_node();
    let group = root.create_node_with("Group", Box::new(GroupNode));
    let child = root.create_node_with("Group", Box::new(GroupNode));
    root.set_node_id(child, "child").unwrap();
    root.attach_child(group, child).unwrap();

    assert!(root.init_graph(group, parent, None, LockMode::Acquire).unwrap());
    assert!(root.is_initialized(child));
    assert_eq!(root.resolve_path(parent, "child"), Some(child));
    assert_eq!(root.set_node_id(child, "renamed"), Err(GraphError::StillInitialized));

    assert!(root.deinit_graph(group, parent, LockMode::Acquire).unwrap());
    assert!(!root.is_initialized(child));
    assert_eq!(root.resolve_path(parent, "child"), None);
    assert_eq!(root.children(group), &[child]);
}

#[test]
fn test_depth_guard_skips_deep_subtree() {
    let mut config = EngineConfig::new();
    config.graph.max_depth = 2;
    let mut root = Root::new(config);
    let parent = root.root_node();
    let a = root.create_node_with("Group", Box::new(GroupNode));
    let b = root.create_node_with("Group", Box::new(GroupNode));
    let c = root.create_node_with("Group", Box::new(GroupNode));
    root.attach_child(a, b).unwrap();
    root.attach_child(b, c).unwrap();

    assert!(!root.init_graph(a, parent, None, LockMode::Acquire).unwrap());
    assert!(root.is_initialized(b));
    assert!(!root.is_initialized(c));
    assert_eq!(root.init_results().len(), 1);

    assert!(root.deinit_graph(a, parent, LockMode::Acquire).unwrap());
    assert!(!root.is_initialized(a));
}

#[test]
fn test_controller_follows_owner_reinit() {
    let mut root = Root::default();
    let parent = root.root_node();
    let node = live_group(&mut root, "owner");
    let controller = root
        .insert_controller(node, Controller::new("Controller", Facets::new(), Box::new(FacetController)))
        .unwrap();
    root.add_controller(node, controller).unwrap();
    assert_eq!(root.controller(controller).unwrap().state(), ControllerState::Uninitialized);

    assert!(root.deinit_graph(node, parent, LockMode::Acquire).unwrap());
    assert!(root.init_graph(node, parent, None, LockMode::Acquire).unwrap());
    assert!(root.controller(controller).unwrap().is_initialized());

    assert!(root.deinit_graph(node, parent, LockMode::Acquire).unwrap());
    root.remove_controller(node, controller).unwrap();
    root.destroy_node(node).unwrap();
    let detached = root.controller(controller).unwrap();
    assert_eq!(detached.owner(), node);
    assert!(!detached.is_attached());
    root.destroy_controller(controller).unwrap();
}

#[test]
fn test_destroying_node_destroys_attached_controllers() {
    let mut root = Root::default();
    let node = root.create_node_with("Group", Box::new(GroupNode));
    let controller = root
        .insert_controller(node, Controller::new("Controller", Facets::new(), Box::new(FacetController)))
        .unwrap();
    root.add_controller(node, controller).unwrap();
    root.destroy_node(node).unwrap();
    assert!(root.controller(controller).is_none());
    assert_eq!(root.controller_count(), 0);
}

#[test]
fn test_target_forgets_destroyed_node() {
    let mut root = Root::default();
    let parent = root.root_node();
    let victim = live_group(&mut root, "victim");
    let mut target = NodeTarget::default();
    target.add_path("victim");
    assert_eq!(target.resolve(&root, parent), 1);
    assert_eq!(target.get_node(&root, 0), Some(victim));

    assert!(root.deinit_graph(victim, parent, LockMode::Acquire).unwrap());
    root.destroy_node(victim).unwrap();
    assert_eq!(target.get_node(&root, 0), None);
}

#[test]
fn test_registry_round_trip() {
    let mut factory = ObjectFactory::new();
    let index = factory.register_node_class("Probe", Probe::default).unwrap();
    assert_eq!(factory.node_class_index("Probe"), i32::try_from(index).unwrap());
    assert!(factory.node_class_index("Probe") >= 0);

    let mut root = Root::default();
    let node = root.create_node("Probe", &factory).unwrap();
    assert_eq!(root.node(node).unwrap().class_name(), "Probe");

    factory.unregister_node_class("Probe").unwrap();
    assert_eq!(factory.node_class_index("Probe"), -1);
    assert!(root.create_node("Probe", &factory).is_err());
}

#[test]
fn test_logic_response_mask_filters_hooks() {
    let mut root = Root::default();
    let node = live_group(&mut root, "owner");
    let mut controller = Controller::new("Counting", Facets::new(), Box::new(Counting::default()));
    controller.set_responses(Responses {
        logic: TraversalMask::DEFAULT,
        ..Responses::all()
    });
    let controller = root.insert_controller(node, controller).unwrap();
    root.add_controller(node, controller).unwrap();
    assert!(root.init_controller(controller).unwrap());

    logic(&mut root, 0.1, TraversalMask::group(1));
    assert_eq!(counting(&root, controller).pre_logic, 0);
    assert_eq!(counting(&root, controller).post_logic, 0);

    logic(&mut root, 0.1, TraversalMask::DEFAULT | TraversalMask::group(1));
    assert_eq!(counting(&root, controller).pre_logic, 1);
    assert_eq!(counting(&root, controller).post_logic, 1);
}

#[test]
fn test_cancel_finish_skips_own_finish() {
    let mut root = Root::default();
    let parent = root.root_node();
    let node = live(
        &mut root,
        parent,
        "cancelling",
        Box::new(Probe {
            cancel: true,
            ..Probe::default()
        }),
    );
    let child = live(&mut root, node, "child", Box::<Probe>::default());
    let controller = root
        .insert_controller(node, Controller::new("Counting", Facets::new(), Box::new(Counting::default())))
        .unwrap();
    root.add_controller(node, controller).unwrap();
    root.init_controller(controller).unwrap();

    logic(&mut root, 0.1, TraversalMask::DEFAULT);
    assert_eq!(probe(&root, node).processed, 1);
    assert_eq!(probe(&root, node).finished, 0);
    assert_eq!(probe(&root, child).processed, 1);
    assert_eq!(probe(&root, child).finished, 1);
    assert_eq!(counting(&root, controller).pre_logic, 1);
    assert_eq!(counting(&root, controller).post_logic, 0);
}

#[test]
fn test_inactive_subtree_is_skipped() {
    let mut root = Root::default();
    let parent = root.root_node();
    let group = live_group(&mut root, "group");
    let child = live(&mut root, group, "child", Box::<Probe>::default());

    root.set_active(group, false).unwrap();
    logic(&mut root, 0.1, TraversalMask::DEFAULT);
    assert_eq!(probe(&root, child).processed, 0);

    root.set_active(group, true).unwrap();
    logic(&mut root, 0.1, TraversalMask::DEFAULT);
    assert_eq!(probe(&root, child).processed, 1);
    assert!(root.is_initialized(parent));
}

#[test]
fn test_structural_edit_fails_while_locked_elsewhere() {
    let mut root = Root::default();
    let parent = root.root_node();
    let node = root.create_node_with("Group", Box::new(GroupNode));
    let probe = root.lock_probe();

    root.lock().unwrap();
    assert!(!root.can_modify_graph());
    let result = thread::scope(|scope| {
        scope
            .spawn(|| {
                assert!(!probe.can_modify_graph());
                root.init_graph(node, parent, None, LockMode::Acquire)
            })
            .join()
            .unwrap()
    });
    assert_eq!(result, Err(GraphError::GraphBusy));

    root.unlock();
    assert!(probe.can_modify_graph());
    assert!(root.init_graph(node, parent, None, LockMode::Acquire).unwrap());
}

#[test]
fn test_secondary_links() {
    let mut root = Root::default();
    let a = live_group(&mut root, "a");
    let b = live_group(&mut root, "b");
    let shared = live(&mut root, a, "shared", Box::<Probe>::default());

    root.link_node(b, shared, None, LockMode::Acquire).unwrap();
    assert_eq!(root.parents(shared), &[a, b]);
    assert_eq!(
        root.link_node(b, shared, None, LockMode::Acquire),
        Err(GraphError::AlreadyLinked)
    );
    assert_eq!(root.link_node(shared, a, None, LockMode::Acquire), Err(GraphError::WouldCycle));
    assert_eq!(root.unlink_node(a, shared, LockMode::Acquire), Err(GraphError::PrimaryLink));
    assert_eq!(
        root.deinit_graph(shared, b, LockMode::Acquire),
        Err(GraphError::NotPrimaryParent)
    );

    logic(&mut root, 0.1, TraversalMask::DEFAULT);
    assert_eq!(probe(&root, shared).processed, 2);

    root.unlink_node(b, shared, LockMode::Acquire).unwrap();
    assert_eq!(root.parents(shared), &[a]);

    root.link_node(b, shared, None, LockMode::Acquire).unwrap();
    let parent = root.root_node();
    assert!(root.deinit_graph(b, parent, LockMode::Acquire).unwrap());
    assert_eq!(root.parents(shared), &[a]);
    assert!(root.is_initialized(shared));
}

#[test]
fn test_animation_controller_follows_timeline() {
    let mut root = Root::default();
    let parent = root.root_node();
    let mut clip = AnimationClip {
        name: "rise".to_string(),
        ..AnimationClip::default()
    };
    clip.tracks.insert(
        "height".to_string(),
        vec![Keyframe::new(0.0, 0.0), Keyframe::new(4.0, 8.0)],
    );
    root.resources_mut()
        .insert("rise", Resource::Animation(Animation { clips: vec![clip] }));

    let timeline = live(&mut root, parent, "clock", Box::<TimelineNode>::default());
    let target = live(&mut root, timeline, "target", Box::new(GroupNode));
    let facets = Facets::new()
        .with_time(TimeFacet::new())
        .with_animation(AnimationFacet::new("rise"));
    let controller = root
        .insert_controller(target, Controller::new("AnimationTimeController", facets, Box::new(FacetController)))
        .unwrap();
    root.add_controller(target, controller).unwrap();
    assert!(root.init_controller(controller).unwrap());
    assert_eq!(root.controller(controller).unwrap().time().unwrap().evaluator_count(), 1);

    logic(&mut root, 1.0, TraversalMask::DEFAULT);
    let height = root.node(target).unwrap().property("height").and_then(PropertyValue::as_float);
    assert_relative_eq!(height.unwrap(), 2.0);

    root.controller_mut(controller).unwrap().time_mut().unwrap().time_scale = 2.0;
    logic(&mut root, 0.25, TraversalMask::DEFAULT);
    let height = root.node(target).unwrap().property("height").and_then(PropertyValue::as_float);
    assert_relative_eq!(height.unwrap(), 2.5 * 2.0);
}

#[test]
fn test_missing_animation_fails_controller_init() {
    let mut root = Root::default();
    let node = live_group(&mut root, "owner");
    let facets = Facets::new()
        .with_time(TimeFacet::new())
        .with_animation(AnimationFacet::new("missing"));
    let controller = root
        .insert_controller(node, Controller::new("AnimationTimeController", facets, Box::new(FacetController)))
        .unwrap();
    root.add_controller(node, controller).unwrap();
    assert!(!root.init_controller(controller).unwrap());
    assert_eq!(root.controller(controller).unwrap().state(), ControllerState::Uninitialized);
}

#[test]
fn test_input_is_consumed_by_active_nodes() {
    let mut root = Root::default();
    let parent = root.root_node();
    let consumer = live(
        &mut root,
        parent,
        "consumer",
        Box::new(Probe {
            consumes: Some("fire"),
            ..Probe::default()
        }),
    );
    let events = vec![InputEvent::new("fire", true), InputEvent::new("jump", true)];

    let remaining = root.process_input(events.clone(), TraversalMask::DEFAULT).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "jump");

    root.set_active(consumer, false).unwrap();
    let remaining = root.process_input(events, TraversalMask::DEFAULT).unwrap();
    assert_eq!(remaining.len(), 2);
}

#[test]
fn test_output_pushes_visible_objects() {
    let mut root = Root::default();
    root.renderers_mut().init_all().unwrap();
    let parent = root.root_node();
    let group = live_group(&mut root, "group");
    let drawable = live(
        &mut root,
        group,
        "mesh",
        Box::new(DrawableNode::new(128, SuspensionPolicy::Automatic)),
    );
    assert!(root.node(drawable).unwrap().behavior_as::<DrawableNode>().unwrap().object().is_some());
    assert_eq!(root.renderers().stats().allocated_bytes, 128);

    root.renderers_mut().begin_submission_all().unwrap();
    assert_eq!(root.process_output(TraversalMask::DEFAULT).unwrap(), 1);
    root.renderers_mut().end_submission_all().unwrap();
    assert_eq!(root.renderers().video.submitted().len(), 1);

    root.set_visible(group, false).unwrap();
    root.renderers_mut().begin_submission_all().unwrap();
    assert_eq!(root.process_output(TraversalMask::DEFAULT).unwrap(), 0);
    root.renderers_mut().end_submission_all().unwrap();

    assert!(root.deinit_graph(group, parent, LockMode::Acquire).unwrap());
    assert_eq!(root.renderers().stats().allocated_bytes, 0);
}
