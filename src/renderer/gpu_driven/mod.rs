//! GPU-driven visibility culling and indirect-draw compaction
//!
//! A compute kernel tests every instance against the view frustum, selects a
//! LOD level by camera distance, and compacts one indirect draw record per
//! visible instance into a device-resident buffer via an atomic counter. The
//! graphics stage consumes that buffer through an indirect-draw-with-count
//! call; the draw count never travels back to the host.

pub mod culling;
pub mod indirect;
pub mod instance_table;
pub mod lod;
pub mod visibility;

pub use culling::{CullUniforms, CullingPipeline, WORKGROUP_SIZE};
pub use indirect::{DrawIndexedIndirectArgs, IndirectBuffers};
pub use instance_table::{InstanceData, InstanceTable, MAX_LOD_LEVELS};
pub use lod::LodThresholds;
pub use visibility::cull_instances;

/// Per-frame snapshot of the runtime toggles
///
/// Read once per frame by the frame controller and passed by value so the
/// culling logic never observes a mid-frame flip.
#[derive(Debug, Clone, Copy)]
pub struct FrameSettings {
    pub culling_enabled: bool,
    pub lod_enabled: bool,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            culling_enabled: true,
            lod_enabled: true,
        }
    }
}
