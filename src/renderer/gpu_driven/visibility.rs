//! CPU reference for the visibility/LOD compute kernel
//!
//! Runs the same per-instance logic as `instance_cull.wgsl` on the host:
//! frustum test, LOD band selection, and compaction into a dense draw list.
//! Used by tests to validate the GPU kernel and by anyone debugging a culling
//! discrepancy without a capture tool.

use cgmath::{MetricSpace, Point3};
use parking_lot::Mutex;
use rayon::prelude::*;

use super::indirect::DrawIndexedIndirectArgs;
use super::instance_table::InstanceData;
use super::lod::LodThresholds;
use super::FrameSettings;
use crate::renderer::frustum::Frustum;

/// Produce the compacted draw list for one frame
///
/// Mirrors the kernel exactly except for ordering: the GPU's atomic counter
/// hands out slots in a nondeterministic order, so comparisons against this
/// output must be order-insensitive.
pub fn cull_instances(
    instances: &[InstanceData],
    frustum: &Frustum,
    camera_position: Point3<f32>,
    thresholds: &LodThresholds,
    settings: FrameSettings,
) -> Vec<DrawIndexedIndirectArgs> {
    let draws = Mutex::new(Vec::with_capacity(instances.len()));

    instances.par_iter().for_each(|instance| {
        if let Some(args) = evaluate_instance(instance, frustum, camera_position, thresholds, settings) {
            draws.lock().push(args);
        }
    });

    draws.into_inner()
}

/// One thread's worth of the kernel: returns a draw record if the instance
/// survives culling, None if it is rejected.
pub fn evaluate_instance(
    instance: &InstanceData,
    frustum: &Frustum,
    camera_position: Point3<f32>,
    thresholds: &LodThresholds,
    settings: FrameSettings,
) -> Option<DrawIndexedIndirectArgs> {
    let (center, radius) = instance.world_sphere();

    if settings.culling_enabled && !frustum.sphere_visible(center, radius) {
        return None;
    }

    let lod = if settings.lod_enabled {
        thresholds.select(camera_position.distance(center), instance.lod_count)
    } else {
        0
    };

    Some(DrawIndexedIndirectArgs {
        index_count: instance.lod_index_count[lod as usize],
        instance_count: 1,
        first_index: instance.lod_first_index[lod as usize],
        base_vertex: instance.base_vertex as i32,
        first_instance: instance.instance_id,
    })
}
