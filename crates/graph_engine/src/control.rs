//! Platform controls
//!
//! Controls sit next to the scene graph in the frame loop: keyboards,
//! timers, application hooks. The engine calls them each tick; the graph
//! never does.

use crate::core::EngineConfig;
use crate::render::RenderStats;
use crate::tracker::{FrameTime, InputEvent};

/// A per-frame participant of the engine loop
#[allow(unused_variables)]
pub trait Control {
    /// Name used in log output
    fn name(&self) -> &str;

    /// Before each logic step; may queue input events for the step
    fn logic_update(&mut self, time: FrameTime, input: &mut Vec<InputEvent>) {}

    /// After the renderers completed a cycle
    fn frame_update(&mut self, stats: &RenderStats) {}

    /// The engine configuration was replaced
    fn config_changed(&mut self, config: &EngineConfig) {}
}

/// Control replaying a fixed schedule of input events
///
/// Each entry fires once, on the first logic step at or after its time.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    schedule: Vec<(f64, InputEvent)>,
}

impl ScriptedInput {
    /// Empty schedule
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `event` at logic time `at`
    pub fn at(mut self, at: f64, event: InputEvent) -> Self {
        self.schedule.push((at, event));
        self.schedule.sort_by(|a, b| a.0.total_cmp(&b.0));
        self
    }

    /// Events not yet fired
    pub fn pending(&self) -> usize {
        self.schedule.len()
    }
}

impl Control for ScriptedInput {
    fn name(&self) -> &str {
        "scripted-input"
    }

    fn logic_update(&mut self, time: FrameTime, input: &mut Vec<InputEvent>) {
        let due = self.schedule.partition_point(|(at, _)| *at <= time.current);
        input.extend(self.schedule.drain(..due).map(|(_, event)| event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_input_fires_once_in_order() {
        let mut control = ScriptedInput::new()
            .at(0.5, InputEvent::new("b", true))
            .at(0.1, InputEvent::new("a", true));
        let mut queue = Vec::new();

        control.logic_update(FrameTime { current: 0.0, ..FrameTime::default() }, &mut queue);
        assert!(queue.is_empty());

        control.logic_update(FrameTime { current: 1.0, ..FrameTime::default() }, &mut queue);
        let names: Vec<&str> = queue.iter().map(|event| event.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(control.pending(), 0);
    }
}
