pub mod error;
pub mod frame_timing;
pub mod frustum;
pub mod gpu_driven;
mod gpu_state;
pub mod surface_size;

use crate::EngineConfig;
use anyhow::Result;
use winit::event_loop::EventLoop;

pub use error::RendererError;
pub use frame_timing::{FrameTimings, GpuTimer, FRAME_TIME_EMA_WEIGHT};
pub use frustum::{Frustum, Plane};
pub use gpu_driven::{
    DrawIndexedIndirectArgs, FrameSettings, InstanceData, LodThresholds, MAX_LOD_LEVELS,
};
pub use surface_size::{SizeAction, SurfaceSizeTracker};

/// Main renderer entry point: builds the GPU state and drives the event loop
/// until the window closes.
pub fn run(event_loop: EventLoop<()>, config: EngineConfig) -> Result<()> {
    log::info!("[renderer::run] Starting renderer initialization");
    log::debug!("[renderer::run] Config: {:?}", config);

    let result = pollster::block_on(gpu_state::run_app(event_loop, config));

    match &result {
        Ok(_) => log::info!("[renderer::run] Frame loop exited cleanly"),
        Err(e) => log::error!("[renderer::run] Frame loop failed: {}", e),
    }

    result
}
