use bytemuck::{Pod, Zeroable};
use cgmath::Point3;
use log::info;

use super::indirect::IndirectBuffers;
use super::instance_table::InstanceTable;
use super::lod::LodThresholds;
use super::FrameSettings;
use crate::renderer::frustum::Frustum;

/// Threads per workgroup in instance_cull.wgsl; must match the
/// @workgroup_size attribute there.
pub const WORKGROUP_SIZE: u32 = 64;

/// Per-frame uniform for the culling kernel
///
/// Layout mirrors CullUniforms in instance_cull.wgsl field for field.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CullUniforms {
    /// Six planes as (normal.xyz, offset)
    pub frustum_planes: [[f32; 4]; 6],
    pub camera_position: [f32; 3],
    pub instance_count: u32,
    /// Padded with f32::MAX in unused lanes
    pub lod_distances: [f32; 4],
    pub culling_enabled: u32,
    pub lod_enabled: u32,
    pub lod_threshold_count: u32,
    pub _pad: u32,
}

impl CullUniforms {
    pub fn new(
        frustum: &Frustum,
        camera_position: Point3<f32>,
        instance_count: u32,
        thresholds: &LodThresholds,
        settings: FrameSettings,
    ) -> Self {
        Self {
            frustum_planes: frustum.to_gpu(),
            camera_position: camera_position.into(),
            instance_count,
            lod_distances: thresholds.to_gpu(),
            culling_enabled: settings.culling_enabled as u32,
            lod_enabled: settings.lod_enabled as u32,
            lod_threshold_count: thresholds.count() as u32,
            _pad: 0,
        }
    }
}

/// GPU side of visibility culling and draw compaction
///
/// Owns the cull uniform, the shader module, and the two compute pipelines
/// (count reset + per-instance cull). The caller supplies the instance table
/// and indirect buffers at bind time.
pub struct CullingPipeline {
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    reset_pipeline: wgpu::ComputePipeline,
    cull_pipeline: wgpu::ComputePipeline,
    instance_count: u32,
}

impl CullingPipeline {
    pub fn new(
        device: &wgpu::Device,
        instances: &InstanceTable,
        indirect: &IndirectBuffers,
    ) -> Self {
        info!(
            "[CullingPipeline::new] Creating culling pipeline for {} instances",
            instances.count()
        );

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Instance Cull Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../shaders/instance_cull.wgsl").into(),
            ),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cull Uniform Buffer"),
            size: std::mem::size_of::<CullUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Cull Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cull Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: instances.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: indirect.draws().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: indirect.count().as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Cull Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let reset_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Reset Draw Count Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "reset_count",
        });

        let cull_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Cull Instances Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "cull_instances",
        });

        Self {
            uniform_buffer,
            bind_group,
            reset_pipeline,
            cull_pipeline,
            instance_count: instances.count(),
        }
    }

    /// Upload the frame's uniform; call before `encode`
    pub fn update_uniforms(&self, queue: &wgpu::Queue, uniforms: &CullUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Record the count reset and the culling dispatch in one compute pass.
    /// wgpu synchronizes the storage writes between the two dispatches, so
    /// the cull threads never race the reset.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        timestamp_writes: Option<wgpu::ComputePassTimestampWrites>,
    ) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Instance Cull Pass"),
            timestamp_writes,
        });

        pass.set_bind_group(0, &self.bind_group, &[]);

        pass.set_pipeline(&self.reset_pipeline);
        pass.dispatch_workgroups(1, 1, 1);

        pass.set_pipeline(&self.cull_pipeline);
        let workgroups = self.instance_count.div_ceil(WORKGROUP_SIZE);
        pass.dispatch_workgroups(workgroups, 1, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_struct_has_wgsl_compatible_layout() {
        // 6 vec4 planes + 3 vec4 tail fields, no implicit padding
        assert_eq!(std::mem::size_of::<CullUniforms>(), 144);
    }

    #[test]
    fn uniform_encodes_frame_settings() {
        let camera = crate::camera::Camera::new(800, 600);
        let frustum = Frustum::from_camera(&camera);
        let thresholds = LodThresholds::new(&[50.0, 150.0]);
        let settings = FrameSettings {
            culling_enabled: true,
            lod_enabled: false,
        };

        let uniforms = CullUniforms::new(&frustum, camera.position, 10_000, &thresholds, settings);

        assert_eq!(uniforms.instance_count, 10_000);
        assert_eq!(uniforms.culling_enabled, 1);
        assert_eq!(uniforms.lod_enabled, 0);
        assert_eq!(uniforms.lod_threshold_count, 2);
        assert_eq!(uniforms.lod_distances[2], f32::MAX);
    }

    #[test]
    fn dispatch_covers_every_instance() {
        // 10,000 instances at 64 threads per group needs 157 groups
        assert_eq!(10_000u32.div_ceil(WORKGROUP_SIZE), 157);
    }
}
