pub mod camera;
pub mod input;
pub mod renderer;
pub mod scene;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use winit::event_loop::EventLoop;

pub use camera::Camera;
pub use input::InputState;
pub use renderer::{FrameSettings, FrameTimings};
pub use scene::{GeometryStore, Scene};

/// Main engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    /// Number of mesh instances scattered through the scene
    pub instance_count: u32,
    /// Half-extent of the cube the instances are scattered in
    pub scene_radius: f32,
    /// Distance thresholds separating LOD bands, ascending
    pub lod_distances: Vec<f32>,
    /// Initial state of the runtime toggles
    pub culling_enabled: bool,
    pub lod_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_title: "Horde Engine".to_string(),
            window_width: 1280,
            window_height: 720,
            instance_count: 10_000,
            scene_radius: 100.0,
            lod_distances: vec![50.0, 150.0, 400.0],
            culling_enabled: true,
            lod_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.instance_count > 0, "instance_count must be non-zero");
        anyhow::ensure!(self.scene_radius > 0.0, "scene_radius must be positive");
        anyhow::ensure!(
            self.lod_distances.windows(2).all(|w| w[0] < w[1]),
            "lod_distances must be strictly ascending"
        );
        anyhow::ensure!(
            self.lod_distances.len() < renderer::MAX_LOD_LEVELS,
            "at most {} lod distance thresholds are supported",
            renderer::MAX_LOD_LEVELS - 1
        );
        Ok(())
    }
}

/// Main engine struct that runs the frame loop
pub struct Engine {
    config: EngineConfig,
    event_loop: Option<EventLoop<()>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let event_loop = EventLoop::new().context("Failed to create event loop")?;

        Ok(Self {
            config,
            event_loop: Some(event_loop),
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = self
            .event_loop
            .take()
            .context("Event loop already taken")?;
        renderer::run(event_loop, self.config)
    }
}
