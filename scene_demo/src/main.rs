//! Scene graph demo application
//!
//! Loads a scene template, spins a drawable under a looping timeline and
//! toggles its visibility to show renderer object suspension.
//!
//! Usage: `scene_demo [scene.toml] [engine.toml]`

use std::path::PathBuf;

use graph_engine::foundation::logging;
use graph_engine::prelude::*;
use graph_engine::render::RenderStats;

const FRAMES: u64 = 240;

/// Logs renderer statistics at a fixed frame interval
struct StatsReporter {
    every: u64,
    frames: u64,
}

impl StatsReporter {
    fn new(every: u64) -> Self {
        Self { every, frames: 0 }
    }
}

impl Control for StatsReporter {
    fn name(&self) -> &str {
        "stats-reporter"
    }

    fn frame_update(&mut self, stats: &RenderStats) {
        self.frames += 1;
        if self.frames % self.every == 0 {
            log::info!(
                "frame {}: {} bytes resident, {} objects suspended, {} pushed",
                stats.frames,
                stats.allocated_bytes,
                stats.suspended_objects,
                stats.pushed_objects
            );
        }
    }
}

struct SceneDemo {
    scene_path: PathBuf,
    teapot: Option<NodeKey>,
    frame: u64,
}

impl SceneDemo {
    fn new(scene_path: PathBuf) -> Self {
        Self {
            scene_path,
            teapot: None,
            frame: 0,
        }
    }
}

impl Application for SceneDemo {
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
        log::info!("Initializing scene demo...");
        let template = GraphTemplate::load(&self.scene_path).map_err(|e| AppError::Config(e.to_string()))?;

        let (root, factory) = engine.parts_mut();
        let scene = GraphFactory::create_graph(root, factory, &template)?;
        let parent = root.root_node();
        if !root.init_graph(scene, parent, None, LockMode::Acquire)? {
            for result in root.init_results() {
                log::warn!("{result}");
            }
        }

        self.teapot = root.resolve_path(parent, "demo/teapot");
        if self.teapot.is_none() {
            log::warn!("Scene has no 'demo/teapot' node; visibility toggling disabled");
        }

        engine.add_control(Box::new(StatsReporter::new(60)));
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine, _delta_time: f64) -> Result<(), AppError> {
        self.frame += 1;
        let Some(teapot) = self.teapot else {
            return Ok(());
        };
        match self.frame {
            90 => {
                log::info!("Hiding teapot");
                engine.root_mut().set_visible(teapot, false)?;
            }
            150 => {
                log::info!("Showing teapot");
                engine.root_mut().set_visible(teapot, true)?;
            }
            200 => engine.request_manual_suspension(),
            _ => {}
        }
        Ok(())
    }

    fn cleanup(&mut self, engine: &mut Engine) {
        let stats = engine.renderers().stats();
        log::info!(
            "Scene demo finished after {} frames ({} render cycles)",
            self.frame,
            stats.frames
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let scene_path = args
        .next()
        .map_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenes/demo.toml"), PathBuf::from);
    let config = match args.next() {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::default().with_logic_step(1.0 / 60.0),
    };

    logging::init_with_level(&config.log_level);
    log::info!("Starting scene demo with '{}'", scene_path.display());

    let mut app = SceneDemo::new(scene_path);
    Engine::run(config, &mut app, Some(FRAMES))?;
    Ok(())
}
