use bytemuck::{Pod, Zeroable};
use cgmath::{Point3, Quaternion, Vector3};

/// Maximum LOD levels per instance; `lod_count` says how many are valid
pub const MAX_LOD_LEVELS: usize = 4;

/// One drawable instance, in the exact layout the culling shader reads
///
/// Built once at scene load and immutable afterwards. `instance_id` is
/// written into the draw command's `first_instance` so the vertex stage can
/// re-fetch this record through `@builtin(instance_index)`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct InstanceData {
    /// World position
    pub position: [f32; 3],
    /// Uniform scale
    pub scale: f32,
    /// Unit quaternion, xyzw
    pub orientation: [f32; 4],
    /// Bounding sphere center, mesh local space
    pub bounds_center: [f32; 3],
    /// Bounding sphere radius, mesh local space
    pub bounds_radius: f32,
    /// Index count per LOD level
    pub lod_index_count: [u32; MAX_LOD_LEVELS],
    /// First index per LOD level
    pub lod_first_index: [u32; MAX_LOD_LEVELS],
    /// Vertex offset shared by all LODs of this instance
    pub base_vertex: u32,
    /// Stable id, doubles as the draw command's first_instance
    pub instance_id: u32,
    /// Number of valid LOD levels, in [1, MAX_LOD_LEVELS]
    pub lod_count: u32,
    pub _pad: u32,
}

impl InstanceData {
    /// Bounding sphere in world space: center through the full transform,
    /// radius scaled by the uniform scale.
    pub fn world_sphere(&self) -> (Point3<f32>, f32) {
        let rotation = Quaternion::new(
            self.orientation[3],
            self.orientation[0],
            self.orientation[1],
            self.orientation[2],
        );
        let local = Vector3::from(self.bounds_center);
        let center = Point3::from(self.position) + rotation * local * self.scale;
        (center, self.bounds_radius * self.scale)
    }
}

/// Device-resident array of instance records
pub struct InstanceTable {
    buffer: wgpu::Buffer,
    count: u32,
}

impl InstanceTable {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, instances: &[InstanceData]) -> Self {
        assert!(!instances.is_empty(), "instance table must not be empty");

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Table"),
            size: std::mem::size_of_val(instances) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&buffer, 0, bytemuck::cast_slice(instances));

        log::info!(
            "[InstanceTable::new] Uploaded {} instances ({} KB)",
            instances.len(),
            std::mem::size_of_val(instances) / 1024
        );

        Self {
            buffer,
            count: instances.len() as u32,
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, InnerSpace, Rotation3};

    fn instance_at(position: [f32; 3], scale: f32) -> InstanceData {
        InstanceData {
            position,
            scale,
            orientation: [0.0, 0.0, 0.0, 1.0],
            bounds_center: [0.0, 0.0, 0.0],
            bounds_radius: 1.0,
            lod_index_count: [36, 18, 0, 0],
            lod_first_index: [0, 36, 0, 0],
            base_vertex: 0,
            instance_id: 7,
            lod_count: 2,
            _pad: 0,
        }
    }

    #[test]
    fn record_layout_is_gpu_sized() {
        // The WGSL mirror of this struct is 96 bytes
        assert_eq!(std::mem::size_of::<InstanceData>(), 96);
    }

    #[test]
    fn world_sphere_applies_translation_and_scale() {
        let mut instance = instance_at([10.0, 0.0, 0.0], 2.0);
        instance.bounds_center = [1.0, 0.0, 0.0];
        let (center, radius) = instance.world_sphere();
        assert!((center.x - 12.0).abs() < 1e-5);
        assert_eq!(radius, 2.0);
    }

    #[test]
    fn world_sphere_applies_rotation() {
        let mut instance = instance_at([0.0, 0.0, 0.0], 1.0);
        instance.bounds_center = [1.0, 0.0, 0.0];
        let q = Quaternion::from_angle_z(Deg(90.0)).normalize();
        instance.orientation = [q.v.x, q.v.y, q.v.z, q.s];
        let (center, _) = instance.world_sphere();
        assert!(center.x.abs() < 1e-5);
        assert!((center.y - 1.0).abs() < 1e-5);
    }
}
