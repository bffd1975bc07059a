/// Visibility pipeline validation
///
/// Exercises culling, LOD selection and draw compaction end to end: first
/// against the CPU reference kernel on a generated scene, then by running the
/// actual WGSL kernel and comparing its compacted output set against the
/// reference. GPU tests skip when no adapter is available.

use std::sync::Arc;

use horde_engine::renderer::gpu_driven::{
    cull_instances, CullUniforms, CullingPipeline, DrawIndexedIndirectArgs, IndirectBuffers,
    InstanceTable,
};
use horde_engine::renderer::{FrameSettings, Frustum, InstanceData, LodThresholds};
use horde_engine::{Camera, EngineConfig, Scene};

fn init_gpu() -> Option<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))?;

    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("GPU Test Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        },
        None,
    ))
    .ok()?;

    Some((Arc::new(device), Arc::new(queue)))
}

fn test_camera() -> Camera {
    // Looks down -Z from the origin side, matching the startup pose
    Camera::new(800, 600)
}

fn test_instance(id: u32, position: [f32; 3]) -> InstanceData {
    InstanceData {
        position,
        scale: 1.0,
        orientation: [0.0, 0.0, 0.0, 1.0],
        bounds_center: [0.0; 3],
        bounds_radius: 1.0,
        lod_index_count: [960, 240, 60, 0],
        lod_first_index: [0, 960, 1200, 0],
        base_vertex: 0,
        instance_id: id,
        lod_count: 3,
        _pad: 0,
    }
}

/// Instances placed well clear of any frustum plane, so CPU and GPU floating
/// point cannot disagree about visibility.
fn layered_instances() -> Vec<InstanceData> {
    let mut instances = Vec::new();
    let mut id = 0;
    // Clearly inside, at increasing depth for distinct LOD bands
    for z in [-10.0, -120.0, -600.0] {
        for x in [-3.0, 0.0, 3.0] {
            instances.push(test_instance(id, [x * (-z) / 20.0, 0.0, z]));
            id += 1;
        }
    }
    // Clearly outside: behind the camera and far past the far plane
    for z in [50.0, -5000.0] {
        instances.push(test_instance(id, [0.0, 0.0, z]));
        id += 1;
    }
    instances
}

#[test]
fn generated_scene_culls_to_a_sound_draw_list() {
    let config = EngineConfig {
        instance_count: 2_000,
        scene_radius: 100.0,
        ..Default::default()
    };
    let scene = Scene::generate(&config);
    let camera = test_camera();
    let frustum = Frustum::from_camera(&camera);
    let thresholds = LodThresholds::new(&config.lod_distances);

    let draws = cull_instances(
        &scene.instances,
        &frustum,
        camera.position,
        &thresholds,
        FrameSettings::default(),
    );

    // Plenty culled, plenty kept: the camera sits inside the scatter volume
    assert!(!draws.is_empty());
    assert!(draws.len() < scene.instances.len());

    let mut ids: Vec<u32> = draws.iter().map(|d| d.first_instance).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), draws.len(), "each instance draws at most once");

    for draw in &draws {
        let instance = &scene.instances[draw.first_instance as usize];
        assert_eq!(draw.instance_count, 1);
        assert_eq!(draw.base_vertex, instance.base_vertex as i32);
        let lod = (0..instance.lod_count as usize)
            .find(|&l| instance.lod_first_index[l] == draw.first_index)
            .unwrap_or_else(|| panic!("draw range matches no LOD of instance {}", draw.first_instance));
        assert_eq!(draw.index_count, instance.lod_index_count[lod]);
    }
}

#[test]
fn disabling_culling_draws_every_instance() {
    let instances = layered_instances();
    let camera = test_camera();
    let frustum = Frustum::from_camera(&camera);
    let thresholds = LodThresholds::new(&[50.0, 150.0]);

    let draws = cull_instances(
        &instances,
        &frustum,
        camera.position,
        &thresholds,
        FrameSettings {
            culling_enabled: false,
            lod_enabled: true,
        },
    );

    assert_eq!(draws.len(), instances.len());
}

#[test]
fn depth_layers_land_in_distinct_lod_bands() {
    let camera = test_camera();
    let frustum = Frustum::from_camera(&camera);
    let thresholds = LodThresholds::new(&[50.0, 150.0]);
    let eye = camera.position;

    let expect_band = |z: f32, index_count: u32| {
        let instance = test_instance(0, [0.0, 0.0, z]);
        let draws = cull_instances(
            std::slice::from_ref(&instance),
            &frustum,
            eye,
            &thresholds,
            FrameSettings::default(),
        );
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].index_count, index_count, "at depth {}", z);
    };

    expect_band(-10.0, 960);
    expect_band(-120.0, 240);
    expect_band(-600.0, 60);
}

fn run_gpu_kernel(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    instances: &[InstanceData],
    uniforms: &CullUniforms,
) -> (u32, Vec<DrawIndexedIndirectArgs>) {
    let table = InstanceTable::new(device, queue, instances);
    let indirect = IndirectBuffers::new(device, table.count());
    let pipeline = CullingPipeline::new(device, &table, &indirect);
    pipeline.update_uniforms(queue, uniforms);

    let draws_size = (std::mem::size_of::<DrawIndexedIndirectArgs>() * instances.len()) as u64;
    let staging_draws = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Draws Readback"),
        size: draws_size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let staging_count = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Count Readback"),
        size: 4,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    pipeline.encode(&mut encoder, None);
    encoder.copy_buffer_to_buffer(indirect.draws(), 0, &staging_draws, 0, draws_size);
    encoder.copy_buffer_to_buffer(indirect.count(), 0, &staging_count, 0, 4);
    queue.submit(std::iter::once(encoder.finish()));

    let read_back = |buffer: &wgpu::Buffer| -> Vec<u8> {
        let slice = buffer.slice(..);
        let (tx, rx) = flume::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv().unwrap().unwrap();
        let data = slice.get_mapped_range().to_vec();
        buffer.unmap();
        data
    };

    let count: u32 = bytemuck::pod_read_unaligned(&read_back(&staging_count));
    let mut draws: Vec<DrawIndexedIndirectArgs> =
        bytemuck::pod_collect_to_vec(&read_back(&staging_draws));
    draws.truncate(count as usize);
    (count, draws)
}

fn sorted_by_id(mut draws: Vec<DrawIndexedIndirectArgs>) -> Vec<DrawIndexedIndirectArgs> {
    draws.sort_unstable_by_key(|d| d.first_instance);
    draws
}

#[test]
fn gpu_kernel_matches_cpu_reference() {
    let Some((device, queue)) = init_gpu() else {
        println!("Skipping GPU test - no GPU available");
        return;
    };

    let instances = layered_instances();
    let camera = test_camera();
    let frustum = Frustum::from_camera(&camera);
    let thresholds = LodThresholds::new(&[50.0, 150.0]);

    for settings in [
        FrameSettings::default(),
        FrameSettings {
            culling_enabled: false,
            lod_enabled: true,
        },
        FrameSettings {
            culling_enabled: true,
            lod_enabled: false,
        },
    ] {
        let expected = sorted_by_id(cull_instances(
            &instances,
            &frustum,
            camera.position,
            &thresholds,
            settings,
        ));

        let uniforms = CullUniforms::new(
            &frustum,
            camera.position,
            instances.len() as u32,
            &thresholds,
            settings,
        );
        let (count, draws) = run_gpu_kernel(&device, &queue, &instances, &uniforms);

        assert_eq!(count as usize, expected.len(), "settings {:?}", settings);
        assert_eq!(sorted_by_id(draws), expected, "settings {:?}", settings);
    }
}

#[test]
fn gpu_kernel_ignores_workgroup_padding() {
    let Some((device, queue)) = init_gpu() else {
        println!("Skipping GPU test - no GPU available");
        return;
    };

    // 3 instances in a 64-wide dispatch: 61 padding threads must not
    // reserve slots even with culling disabled.
    let instances: Vec<InstanceData> = (0..3)
        .map(|id| test_instance(id, [0.0, 0.0, -10.0 * (id + 1) as f32]))
        .collect();
    let camera = test_camera();
    let frustum = Frustum::from_camera(&camera);
    let thresholds = LodThresholds::new(&[50.0, 150.0]);
    let settings = FrameSettings {
        culling_enabled: false,
        lod_enabled: false,
    };

    let uniforms = CullUniforms::new(
        &frustum,
        camera.position,
        instances.len() as u32,
        &thresholds,
        settings,
    );
    let (count, draws) = run_gpu_kernel(&device, &queue, &instances, &uniforms);

    assert_eq!(count, 3);
    let ids: Vec<u32> = sorted_by_id(draws).iter().map(|d| d.first_instance).collect();
    assert_eq!(ids, vec![0, 1, 2]);
}
