/// Horde Engine viewer executable
///
/// Scatters a field of mesh instances and renders them through the
/// GPU-driven culling pipeline. C toggles frustum culling, L toggles LOD
/// selection; smoothed CPU/GPU frame times are shown in the window title.
use anyhow::Result;
use horde_engine::{Engine, EngineConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("[main] Loading config from {}", path);
            EngineConfig::from_file(&path)?
        }
        None => EngineConfig::default(),
    };

    log::info!(
        "[main] Starting with {} instances, scene radius {}",
        config.instance_count,
        config.scene_radius
    );

    let engine = Engine::new(config)?;
    engine.run()
}
