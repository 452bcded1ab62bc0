//! Core engine implementation
//!
//! One engine step runs the platform controls, the logic traversal (once per
//! logic step), the input traversal, the output traversal into a renderer
//! submission, and one render cycle.

use std::mem;

use crate::application::Application;
use crate::control::Control;
use crate::core::{ConfigError, EngineConfig};
use crate::foundation::time::Timer;
use crate::graph::{GraphError, LockMode, Root};
use crate::registry::ObjectFactory;
use crate::render::{RenderError, Renderers};
use crate::tracker::{FrameTime, InputEvent, TraversalMask};
use thiserror::Error;

/// Main engine struct
///
/// Owns the scene graph, the class factory and the platform controls, and
/// drives the frame loop.
pub struct Engine {
    root: Root,
    factory: ObjectFactory,
    controls: Vec<Box<dyn Control>>,
    pending_input: Vec<InputEvent>,
    timer: Timer,
    logic_time: FrameTime,
    accumulator: f64,
    trigger: TraversalMask,
    suspend_manual: bool,
    running: bool,
}

/// What one [`Engine::step`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Logic traversals run
    pub logic_steps: u32,
    /// Objects pushed by the output traversal
    pub pushed: usize,
    /// Renderer objects suspended by the render cycle
    pub suspended: usize,
}

impl Engine {
    /// Create an engine with null renderer back-ends
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let renderers = Renderers::new(&config.renderer);
        Self::with_renderers(config, renderers)
    }

    /// Create an engine around renderers with custom back-ends
    pub fn with_renderers(config: EngineConfig, renderers: Renderers) -> Result<Self, EngineError> {
        config.validate()?;
        log::info!("Initializing engine...");

        let mut root = Root::new(config);
        root.renderers = renderers;
        root.renderers.apply_config(&root.config.renderer);
        root.renderers.init_all()?;

        Ok(Self {
            root,
            factory: ObjectFactory::with_builtins(),
            controls: Vec::new(),
            pending_input: Vec::new(),
            timer: Timer::new(),
            logic_time: FrameTime::default(),
            accumulator: 0.0,
            trigger: TraversalMask::DEFAULT,
            suspend_manual: false,
            running: true,
        })
    }

    /// Run the engine main loop with the given application
    ///
    /// Stops after `frames` frames when given, otherwise when the
    /// application calls [`Engine::shutdown`].
    pub fn run<T: Application>(config: EngineConfig, app: &mut T, frames: Option<u64>) -> Result<(), EngineError> {
        let mut engine = Self::new(config)?;

        app.initialize(&mut engine)
            .map_err(|e| EngineError::Application(format!("App initialization: {e}")))?;

        log::info!("Starting main loop...");

        let mut frame = 0;
        while engine.running && frames.map_or(true, |frames| frame < frames) {
            engine.timer.update();
            let delta_time = engine.timer.delta_time();

            app.update(&mut engine, delta_time)
                .map_err(|e| EngineError::Application(format!("App update: {e}")))?;

            engine.step(delta_time)?;
            frame += 1;
        }

        app.cleanup(&mut engine);
        engine.teardown()?;

        log::info!("Engine shutdown complete ({frame} frames)");
        Ok(())
    }

    /// Advance the engine by `delta_time` seconds
    pub fn step(&mut self, delta_time: f64) -> Result<StepReport, EngineError> {
        let mut report = StepReport::default();

        match self.root.config.timing.logic_step {
            Some(step) => {
                self.accumulator += delta_time;
                while self.accumulator >= step && report.logic_steps < self.root.config.timing.max_logic_steps {
                    self.accumulator -= step;
                    self.logic_step(step)?;
                    report.logic_steps += 1;
                }
                if report.logic_steps == self.root.config.timing.max_logic_steps && self.accumulator >= step {
                    log::debug!("Dropping {:.3}s of logic time", self.accumulator);
                    self.accumulator = 0.0;
                }
            }
            None => {
                self.logic_step(delta_time)?;
                report.logic_steps = 1;
            }
        }

        let events = mem::take(&mut self.pending_input);
        let remaining = self.root.process_input(events, self.trigger)?;
        if !remaining.is_empty() {
            log::trace!("{} input events not consumed", remaining.len());
        }

        self.root.renderers.begin_submission_all()?;
        let output = self.root.process_output(self.trigger);
        self.root.renderers.end_submission_all()?;
        report.pushed = output?;

        let rendered = self.root.renderers.begin_rendering_all(mem::take(&mut self.suspend_manual));
        self.root.renderers.end_rendering_all()?;
        report.suspended = rendered?;

        let stats = self.root.renderers.stats();
        for control in &mut self.controls {
            control.frame_update(&stats);
        }
        Ok(report)
    }

    fn logic_step(&mut self, delta: f64) -> Result<(), GraphError> {
        self.logic_time = FrameTime {
            current: self.logic_time.current + delta,
            delta,
            frame: self.logic_time.frame + 1,
        };
        for control in &mut self.controls {
            control.logic_update(self.logic_time, &mut self.pending_input);
        }
        self.root.process_logic(self.logic_time, self.trigger)
    }

    /// Replace the configuration and broadcast the change
    pub fn config_changed(&mut self, config: EngineConfig) -> Result<(), EngineError> {
        config.validate()?;
        self.root.set_config(config);
        for control in &mut self.controls {
            control.config_changed(&self.root.config);
        }
        self.root.config_changed(TraversalMask::all())?;
        Ok(())
    }

    /// Add a platform control
    pub fn add_control(&mut self, control: Box<dyn Control>) {
        log::debug!("Added control '{}'", control.name());
        self.controls.push(control);
    }

    /// Queue an input event for the next step
    pub fn queue_input(&mut self, event: InputEvent) {
        self.pending_input.push(event);
    }

    /// Trigger mask used by the traversals of subsequent steps
    pub fn set_trigger(&mut self, trigger: TraversalMask) {
        self.trigger = trigger;
    }

    /// Suspend manually-suspendable objects not pushed in the next frame
    pub fn request_manual_suspension(&mut self) {
        self.suspend_manual = true;
    }

    /// The scene graph
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// Mutable access to the scene graph
    pub fn root_mut(&mut self) -> &mut Root {
        &mut self.root
    }

    /// The class factory
    pub fn factory(&self) -> &ObjectFactory {
        &self.factory
    }

    /// Mutable access to the class factory
    pub fn factory_mut(&mut self) -> &mut ObjectFactory {
        &mut self.factory
    }

    /// Scene graph and class factory together
    pub fn parts_mut(&mut self) -> (&mut Root, &ObjectFactory) {
        (&mut self.root, &self.factory)
    }

    /// The renderers
    pub fn renderers(&self) -> &Renderers {
        self.root.renderers()
    }

    /// Accumulated logic time
    pub fn logic_time(&self) -> FrameTime {
        self.logic_time
    }

    /// Whether the main loop keeps running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Request engine shutdown
    pub fn shutdown(&mut self) {
        log::info!("Engine shutdown requested");
        self.running = false;
    }

    /// De-initialize every subtree below the root node and release the renderers
    pub fn teardown(&mut self) -> Result<(), EngineError> {
        let root_node = self.root.root_node();
        for child in self.root.children(root_node).to_vec() {
            if self.root.parents(child).first() == Some(&root_node) {
                self.root.deinit_graph(child, root_node, LockMode::Acquire)?;
            } else if self.root.parents(child).contains(&root_node) {
                self.root.unlink_node(root_node, child, LockMode::Acquire)?;
            }
        }
        self.root.renderers.deinit_all()?;
        Ok(())
    }
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Scene graph error
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Renderer error
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Application error
    #[error("Application error: {0}")]
    Application(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::AppError;
    use crate::control::ScriptedInput;
    use crate::graph::builtin::{DrawableNode, GroupNode};
    use crate::foundation::collections::NodeKey;
    use crate::graph::{NodeBehavior, NodeContext};
    use crate::render::{SubmissionState, SuspensionPolicy};
    use crate::tracker::InputTracker;
    use approx::assert_relative_eq;

    #[derive(Debug, Default)]
    struct Jumper {
        jumps: u32,
    }

    impl NodeBehavior for Jumper {
        fn process_input(&mut self, _ctx: &mut NodeContext<'_>, tracker: &mut InputTracker) {
            while tracker.consume("jump").is_some() {
                self.jumps += 1;
            }
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    fn spawn(engine: &mut Engine, class: &str, behavior: Box<dyn NodeBehavior>) -> NodeKey {
        let root = engine.root_mut();
        let node = root.create_node_with(class, behavior);
        let parent = root.root_node();
        assert!(root.init_graph(node, parent, None, LockMode::Acquire).unwrap());
        node
    }

    #[test]
    fn test_fixed_step_accumulates() {
        let config = EngineConfig::new().with_logic_step(0.1);
        let mut engine = Engine::new(config).unwrap();
        assert_eq!(engine.step(0.05).unwrap().logic_steps, 0);
        assert_eq!(engine.step(0.1).unwrap().logic_steps, 1);
        assert_eq!(engine.logic_time().frame, 1);
        assert_relative_eq!(engine.logic_time().current, 0.1);
    }

    #[test]
    fn test_step_pushes_visible_objects() {
        let mut engine = Engine::new(EngineConfig::new()).unwrap();
        let node = spawn(&mut engine, "Drawable", Box::new(DrawableNode::new(64, SuspensionPolicy::Automatic)));

        let report = engine.step(1.0 / 60.0).unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(engine.renderers().video.submitted().len(), 1);
        assert_eq!(engine.renderers().video.frame(), 1);

        engine.root_mut().set_visible(node, false).unwrap();
        engine.step(1.0 / 60.0).unwrap();
        let report = engine.step(1.0 / 60.0).unwrap();
        assert_eq!(report.pushed, 0);
        assert_eq!(engine.renderers().stats().suspended_objects, 1);
    }

    #[test]
    fn test_step_recovers_after_renderer_restart() {
        let mut engine = Engine::new(EngineConfig::new()).unwrap();
        engine.step(1.0 / 60.0).unwrap();

        engine.root.renderers.audio.stop().unwrap();
        assert!(matches!(
            engine.step(1.0 / 60.0),
            Err(EngineError::Render(RenderError::WrongState { .. }))
        ));
        assert_eq!(engine.renderers().video.state(), SubmissionState::Ready);

        engine.root.renderers.audio.init().unwrap();
        for _ in 0..3 {
            engine.step(1.0 / 60.0).unwrap();
        }
        assert_eq!(engine.renderers().video.frame(), 4);
        assert_eq!(engine.renderers().audio.state(), SubmissionState::Ready);
    }

    #[test]
    fn test_input_reaches_nodes() {
        let mut engine = Engine::new(EngineConfig::new()).unwrap();
        let node = spawn(&mut engine, "Jumper", Box::new(Jumper::default()));
        engine.add_control(Box::new(ScriptedInput::new().at(0.0, InputEvent::new("jump", true))));
        engine.queue_input(InputEvent::new("jump", true));

        engine.step(0.1).unwrap();
        let jumps = engine.root().node(node).unwrap().behavior_as::<Jumper>().unwrap().jumps;
        assert_eq!(jumps, 2);
    }

    #[test]
    fn test_teardown_deinitializes_graph() {
        let mut engine = Engine::new(EngineConfig::new()).unwrap();
        let node = spawn(&mut engine, "Group", Box::new(GroupNode));
        engine.teardown().unwrap();
        assert!(!engine.root().is_initialized(node));
        assert!(!engine.renderers().is_initialized());
        engine.root_mut().destroy_node(node).unwrap();
    }

    #[test]
    fn test_run_stops_after_frames() {
        struct Counter(u32);

        impl Application for Counter {
            fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
                spawn(engine, "Group", Box::new(GroupNode));
                Ok(())
            }

            fn update(&mut self, _engine: &mut Engine, _delta_time: f64) -> Result<(), AppError> {
                self.0 += 1;
                Ok(())
            }

            fn cleanup(&mut self, _engine: &mut Engine) {}
        }

        let mut app = Counter(0);
        Engine::run(EngineConfig::new(), &mut app, Some(3)).unwrap();
        assert_eq!(app.0, 3);
    }
}
