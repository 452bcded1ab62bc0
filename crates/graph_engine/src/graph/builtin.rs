//! Built-in node classes

use std::any::Any;

use crate::foundation::collections::{NodeKey, ObjectKey};
use crate::foundation::math::{Quat, Transform, Vec3};
use crate::graph::node::{Capabilities, NodeBehavior, NodeContext};
use crate::graph::property::{AttributeExt, Attributes, PropertyValue};
use crate::render::audio::{ListenerState, PlayItem};
use crate::render::object::{ResourceObject, SuspensionPolicy};
use crate::render::physics::{IslandState, SimulationItem};
use crate::render::renderer::Renderer;
use crate::render::video::{CameraView, DrawItem};
use crate::render::RenderError;
use crate::target::NodeTarget;
use crate::tracker::{
    ConfigChangedTracker, DeInitTracker, InitTracker, LogicTracker, OutputTracker, TimelineSample, Tracker,
};

macro_rules! impl_any {
    () => {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    };
}

/// Plain grouping node
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupNode;

impl NodeBehavior for GroupNode {
    impl_any!();
}

/// Opens an identifier namespace for its subtree
#[derive(Debug, Clone, Copy, Default)]
pub struct NamespaceNode;

impl NodeBehavior for NamespaceNode {
    fn capabilities(&self) -> Capabilities {
        Capabilities::NAMESPACE
    }

    impl_any!();
}

/// Indirection to another node
///
/// Resolved against the reference node's own namespace when it initializes
/// and again on every config change.
#[derive(Debug, Clone, Default)]
pub struct ReferenceNode {
    target: NodeTarget,
}

impl ReferenceNode {
    /// Reference the node at `path`
    pub fn to_path(path: impl Into<String>) -> Self {
        let mut target = NodeTarget::default();
        target.add_path(path);
        Self { target }
    }

    /// Reference a node directly
    pub fn to_node(key: NodeKey) -> Self {
        let mut target = NodeTarget::default();
        target.add_node(key);
        Self { target }
    }

    /// The referenced target
    pub fn target(&self) -> &NodeTarget {
        &self.target
    }

    fn rebind(&mut self, ctx: &NodeContext<'_>) -> usize {
        match ctx.root().namespace_of(ctx.key()) {
            Some(namespace) => self.target.resolve(ctx.root(), namespace),
            None => 0,
        }
    }
}

impl NodeBehavior for ReferenceNode {
    fn capabilities(&self) -> Capabilities {
        Capabilities::REFERENCE
    }

    fn configure(&mut self, attributes: &Attributes) -> Result<(), String> {
        if let Some(path) = attributes.text("target")? {
            *self = Self::to_path(path);
        }
        Ok(())
    }

    fn init(&mut self, ctx: &mut NodeContext<'_>, tracker: &mut InitTracker) -> bool {
        if !self.target.is_empty() && self.rebind(ctx) == 0 {
            tracker.add_warning("reference target did not resolve");
        }
        true
    }

    fn config_changed(&mut self, ctx: &mut NodeContext<'_>, _tracker: &mut ConfigChangedTracker) {
        self.rebind(ctx);
    }

    impl_any!();
}

/// Broadcasts a running clock to the time controllers of its subtree
#[derive(Debug, Clone)]
pub struct TimelineNode {
    /// Timeline unit index (0..32)
    pub unit: u32,
    /// Trigger group mask
    pub group_mask: u32,
    /// Clip played
    pub clip: usize,
    /// Clip time at which playback starts
    pub start: f64,
    /// Length of the clip; `0` runs forever
    pub duration: f64,
    /// Wrap around at the end instead of stopping
    pub looping: bool,
    /// Playback rate
    pub speed: f64,
    /// Raw blend weight
    pub weight: f64,
    running: bool,
    elapsed: f64,
}

impl Default for TimelineNode {
    fn default() -> Self {
        Self {
            unit: 0,
            group_mask: 1,
            clip: 0,
            start: 0.0,
            duration: 0.0,
            looping: false,
            speed: 1.0,
            weight: 1.0,
            running: true,
            elapsed: 0.0,
        }
    }
}

impl TimelineNode {
    /// Resume playback
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Pause playback
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Rewind to the start
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }

    /// Whether the clock advances
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current clip time
    pub fn time(&self) -> f64 {
        self.start + self.elapsed
    }

    fn advance(&mut self, delta: f64) {
        if !self.running {
            return;
        }
        self.elapsed += delta * self.speed;
        if self.duration > 0.0 {
            if self.looping {
                self.elapsed = self.elapsed.rem_euclid(self.duration);
            } else if self.elapsed >= self.duration {
                self.elapsed = self.duration;
                self.running = false;
            }
        }
    }
}

impl NodeBehavior for TimelineNode {
    fn capabilities(&self) -> Capabilities {
        Capabilities::TIMELINE
    }

    fn configure(&mut self, attributes: &Attributes) -> Result<(), String> {
        let unit = attributes.int_or("unit", i64::from(self.unit))?;
        self.unit = u32::try_from(unit)
            .ok()
            .filter(|unit| *unit < 32)
            .ok_or_else(|| format!("timeline unit {unit} out of range"))?;
        let group_mask = attributes.int_or("group_mask", i64::from(self.group_mask))?;
        self.group_mask = u32::try_from(group_mask).map_err(|_| "group_mask must fit in 32 bits".to_string())?;
        let clip = attributes.int_or("clip", 0)?;
        self.clip = usize::try_from(clip).map_err(|_| "clip must not be negative".to_string())?;
        self.start = attributes.float_or("start", self.start)?;
        self.duration = attributes.float_or("duration", self.duration)?;
        self.looping = attributes.bool_or("looping", self.looping)?;
        self.speed = attributes.float_or("speed", self.speed)?;
        self.weight = attributes.float_or("weight", self.weight)?;
        self.running = attributes.bool_or("autostart", self.running)?;
        Ok(())
    }

    fn process_logic(&mut self, ctx: &mut NodeContext<'_>, tracker: &mut LogicTracker) {
        self.advance(tracker.time().delta);
        ctx.set_property("time", self.time());
        tracker.push_timeline(TimelineSample {
            source: ctx.key(),
            unit: self.unit,
            group_mask: self.group_mask,
            clip: self.clip,
            time: self.time(),
            weight: self.weight,
        });
    }

    impl_any!();
}

/// Carries a local transform
///
/// Each logic step rebuilds the `transform` property from the configured
/// base transform, overridden by the `position`, `rotation_y` (radians) and
/// `scale` properties when controllers write them.
#[derive(Debug, Clone, Default)]
pub struct TransformNode {
    base: Transform,
}

impl TransformNode {
    /// Transform node with a base transform
    pub fn new(base: Transform) -> Self {
        Self { base }
    }

    fn compose(&self, ctx: &NodeContext<'_>) -> Transform {
        let mut transform = self.base.clone();
        if let Some(position) = ctx.property("position").and_then(PropertyValue::as_vector) {
            transform.position = position;
        }
        if let Some(angle) = ctx.property("rotation_y").and_then(PropertyValue::as_float) {
            transform.rotation = Quat::from_axis_angle(&Vec3::y_axis(), angle as f32);
        }
        match ctx.property("scale") {
            Some(PropertyValue::Vector(scale)) => transform.scale = *scale,
            Some(value) => {
                if let Some(uniform) = value.as_float() {
                    transform.scale = Vec3::repeat(uniform as f32);
                }
            }
            None => {}
        }
        transform
    }
}

impl NodeBehavior for TransformNode {
    fn capabilities(&self) -> Capabilities {
        Capabilities::TRANSFORM
    }

    fn configure(&mut self, attributes: &Attributes) -> Result<(), String> {
        if let Some(value) = attributes.get("position") {
            self.base.position = value.as_vector().ok_or("attribute 'position' must be a vector")?;
        }
        if let Some(value) = attributes.get("scale") {
            self.base.scale = match value {
                PropertyValue::Vector(scale) => *scale,
                other => Vec3::repeat(other.as_float().ok_or("attribute 'scale' must be a number or vector")? as f32),
            };
        }
        Ok(())
    }

    fn init(&mut self, ctx: &mut NodeContext<'_>, _tracker: &mut InitTracker) -> bool {
        let transform = self.compose(ctx);
        ctx.set_property("transform", transform);
        true
    }

    fn process_logic(&mut self, ctx: &mut NodeContext<'_>, _tracker: &mut LogicTracker) {
        let transform = self.compose(ctx);
        ctx.set_property("transform", transform);
    }

    impl_any!();
}

/// Selects the current camera of the video renderer
#[derive(Debug, Clone)]
pub struct CameraNode {
    /// Vertical field of view in radians
    pub field_of_view: f32,
}

impl Default for CameraNode {
    fn default() -> Self {
        Self {
            field_of_view: std::f32::consts::FRAC_PI_3,
        }
    }
}

impl NodeBehavior for CameraNode {
    fn capabilities(&self) -> Capabilities {
        Capabilities::CAMERA
    }

    fn configure(&mut self, attributes: &Attributes) -> Result<(), String> {
        self.field_of_view = attributes.float_or("field_of_view", f64::from(self.field_of_view))? as f32;
        Ok(())
    }

    fn process_output(&mut self, ctx: &mut NodeContext<'_>, tracker: &mut OutputTracker) {
        let view = CameraView {
            camera: ctx.key(),
            transform: ctx.root().world_transform(ctx.key()),
            field_of_view: self.field_of_view,
        };
        report(tracker, ctx.renderers().video.set_current_camera(view));
    }

    impl_any!();
}

/// Selects the current listener of the audio renderer
#[derive(Debug, Clone)]
pub struct ListenerNode {
    /// Master gain
    pub gain: f32,
}

impl Default for ListenerNode {
    fn default() -> Self {
        Self { gain: 1.0 }
    }
}

impl NodeBehavior for ListenerNode {
    fn capabilities(&self) -> Capabilities {
        Capabilities::LISTENER
    }

    fn configure(&mut self, attributes: &Attributes) -> Result<(), String> {
        self.gain = attributes.float_or("gain", f64::from(self.gain))? as f32;
        Ok(())
    }

    fn process_output(&mut self, ctx: &mut NodeContext<'_>, tracker: &mut OutputTracker) {
        let listener = ListenerState {
            listener: ctx.key(),
            transform: ctx.root().world_transform(ctx.key()),
            gain: self.gain,
        };
        report(tracker, ctx.renderers().audio.set_current_listener(listener));
    }

    impl_any!();
}

/// Selects the current island of the physics simulator
#[derive(Debug, Clone)]
pub struct IslandNode {
    /// Gravity applied to bodies of the island
    pub gravity: Vec3,
}

impl Default for IslandNode {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
        }
    }
}

impl NodeBehavior for IslandNode {
    fn capabilities(&self) -> Capabilities {
        Capabilities::ISLAND
    }

    fn configure(&mut self, attributes: &Attributes) -> Result<(), String> {
        if let Some(value) = attributes.get("gravity") {
            self.gravity = value.as_vector().ok_or("attribute 'gravity' must be a vector")?;
        }
        Ok(())
    }

    fn process_output(&mut self, ctx: &mut NodeContext<'_>, tracker: &mut OutputTracker) {
        let island = IslandState {
            island: ctx.key(),
            gravity: self.gravity,
        };
        report(tracker, ctx.renderers().physics.set_current_island(island));
    }

    impl_any!();
}

/// A renderer object owned by a node
#[derive(Debug, Clone, Default)]
struct ObjectBinding {
    bytes: u64,
    policy: SuspensionPolicy,
    object: Option<ObjectKey>,
}

impl ObjectBinding {
    fn configure(&mut self, attributes: &Attributes) -> Result<(), String> {
        let bytes = attributes.int_or("bytes", i64::try_from(self.bytes).unwrap_or(i64::MAX))?;
        self.bytes = u64::try_from(bytes).map_err(|_| "attribute 'bytes' must not be negative".to_string())?;
        if let Some(policy) = attributes.text("suspension")? {
            self.policy =
                SuspensionPolicy::from_name(policy).ok_or_else(|| format!("unknown suspension policy '{policy}'"))?;
        }
        Ok(())
    }

    fn register<C, I>(&mut self, renderer: &mut Renderer<C, I>, name: &str, tracker: &mut InitTracker) -> bool {
        match renderer.register_object(Box::new(ResourceObject::new(name, self.bytes)), self.policy) {
            Ok(key) => {
                self.object = Some(key);
                true
            }
            Err(error) => {
                tracker.add_error(format!("failed to register renderer object: {error}"));
                false
            }
        }
    }

    fn unregister<C, I>(&mut self, renderer: &mut Renderer<C, I>, tracker: &mut DeInitTracker) {
        if let Some(key) = self.object.take() {
            if let Err(error) = renderer.unregister_object(key) {
                tracker.add_warning(format!("failed to unregister renderer object: {error}"));
            }
        }
    }
}

fn report(tracker: &mut OutputTracker, result: Result<(), RenderError>) {
    match result {
        Ok(()) => {}
        Err(error) => tracker.add_warning(error.to_string()),
    }
}

fn report_push(tracker: &mut OutputTracker, result: Result<(), RenderError>) {
    if result.is_ok() {
        tracker.record_push();
    }
    report(tracker, result);
}

macro_rules! object_node {
    ($(#[$doc:meta])* $name:ident, $capability:expr, $renderer:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default)]
        pub struct $name {
            binding: ObjectBinding,
        }

        impl $name {
            /// Node owning an object of `bytes` resident bytes
            pub fn new(bytes: u64, policy: SuspensionPolicy) -> Self {
                Self {
                    binding: ObjectBinding {
                        bytes,
                        policy,
                        object: None,
                    },
                }
            }

            /// Renderer object registered while the node is initialized
            pub fn object(&self) -> Option<ObjectKey> {
                self.binding.object
            }
        }

        impl NodeBehavior for $name {
            fn capabilities(&self) -> Capabilities {
                $capability
            }

            fn configure(&mut self, attributes: &Attributes) -> Result<(), String> {
                self.binding.configure(attributes)
            }

            fn init(&mut self, ctx: &mut NodeContext<'_>, tracker: &mut InitTracker) -> bool {
                let name = ctx.id().to_string();
                self.binding.register(&mut ctx.renderers().$renderer, &name, tracker)
            }

            fn deinit(&mut self, ctx: &mut NodeContext<'_>, tracker: &mut DeInitTracker) -> bool {
                self.binding.unregister(&mut ctx.renderers().$renderer, tracker);
                true
            }

            fn process_output(&mut self, ctx: &mut NodeContext<'_>, tracker: &mut OutputTracker) {
                if let Some(object) = self.binding.object {
                    let transform = ctx.root().world_transform(ctx.key());
                    let result = Self::push(ctx, object, transform);
                    report_push(tracker, result);
                }
            }

            impl_any!();
        }
    };
}

object_node!(
    /// Pushes an object to the video renderer
    DrawableNode,
    Capabilities::DRAWABLE,
    video
);

object_node!(
    /// Pushes a sound object to the audio renderer
    SoundNode,
    Capabilities::PLAYABLE,
    audio
);

object_node!(
    /// Pushes a rigid body to the physics simulator
    BodyNode,
    Capabilities::SIMULATABLE,
    physics
);

impl DrawableNode {
    fn push(ctx: &mut NodeContext<'_>, object: ObjectKey, transform: Transform) -> Result<(), RenderError> {
        ctx.renderers()
            .video
            .push_object_for_rendering(DrawItem { object, transform })
    }
}

impl SoundNode {
    fn push(ctx: &mut NodeContext<'_>, object: ObjectKey, transform: Transform) -> Result<(), RenderError> {
        let gain = ctx
            .property("gain")
            .and_then(PropertyValue::as_float)
            .map_or(1.0, |gain| gain as f32);
        ctx.renderers().audio.push_object_for_playing(PlayItem {
            object,
            position: transform.position,
            gain,
        })
    }
}

impl BodyNode {
    fn push(ctx: &mut NodeContext<'_>, object: ObjectKey, transform: Transform) -> Result<(), RenderError> {
        ctx.renderers()
            .physics
            .push_object_for_simulation(SimulationItem { object, transform })
    }
}
