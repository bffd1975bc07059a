use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use winit::{
    dpi::LogicalSize,
    event::{DeviceEvent, ElementState, Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window, WindowBuilder},
};

use crate::camera::{Camera, CameraUniform};
use crate::input::InputState;
use crate::scene::geometry::{GpuGeometry, Vertex};
use crate::scene::Scene;
use crate::EngineConfig;

use super::error::RendererError;
use super::frame_timing::{FrameTimings, GpuTimer};
use super::frustum::Frustum;
use super::gpu_driven::{
    CullUniforms, CullingPipeline, FrameSettings, IndirectBuffers, InstanceTable, LodThresholds,
};
use super::surface_size::{SizeAction, SurfaceSizeTracker};

const CAMERA_MOVE_SPEED: f32 = 30.0;
const CAMERA_LOOK_SENSITIVITY: f32 = 0.1;

/// Everything the frame loop owns: device, swapchain set, pipelines, scene
/// buffers and the per-frame toggles.
struct GpuState {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size_tracker: SurfaceSizeTracker,
    depth_view: wgpu::TextureView,

    camera: Camera,
    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    render_bind_group: wgpu::BindGroup,
    render_pipeline: wgpu::RenderPipeline,

    geometry: GpuGeometry,
    instance_table: InstanceTable,
    indirect: IndirectBuffers,
    culling: CullingPipeline,
    thresholds: LodThresholds,
    settings: FrameSettings,

    timings: FrameTimings,
    gpu_timer: Option<GpuTimer>,
}

impl GpuState {
    async fn new(window: Arc<Window>, engine_config: &EngineConfig) -> Result<Self> {
        log::info!("[GpuState::new] Starting GPU initialization");
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RendererError::AdapterUnavailable)?;

        let info = adapter.get_info();
        log::info!(
            "[GpuState::new] Adapter: {} ({:?}, {:?})",
            info.name,
            info.device_type,
            info.backend
        );

        // Indirect multi-draw with a GPU-side count is the point of the
        // renderer; refuse to start without it rather than fall back.
        let required = wgpu::Features::MULTI_DRAW_INDIRECT
            | wgpu::Features::MULTI_DRAW_INDIRECT_COUNT
            | wgpu::Features::INDIRECT_FIRST_INSTANCE;
        let missing = required - adapter.features();
        if !missing.is_empty() {
            return Err(RendererError::MissingCapability {
                feature: format!("{:?}", missing),
            }
            .into());
        }

        let optional = wgpu::Features::TIMESTAMP_QUERY & adapter.features();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Main Device"),
                    required_features: required | optional,
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| RendererError::DeviceCreationFailed {
                error: e.to_string(),
            })?;

        let surface_caps = surface.get_capabilities(&adapter);
        if surface_caps.formats.is_empty() {
            return Err(RendererError::NoSurfaceFormat.into());
        }
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);
        let depth_view = create_depth_texture(&device, &config);

        log::info!("[GpuState::new] Building scene buffers");
        let scene = Scene::generate(engine_config);
        let geometry = scene.geometry.upload(&device, &queue);
        let instance_table = InstanceTable::new(&device, &queue, &scene.instances);
        let indirect = IndirectBuffers::new(&device, instance_table.count());
        let culling = CullingPipeline::new(&device, &instance_table, &indirect);

        let camera = Camera::new(config.width, config.height);
        let mut camera_uniform = CameraUniform::new();
        camera_uniform.update_view_proj(&camera);
        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Uniform Buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&camera_buffer, 0, bytemuck::bytes_of(&camera_uniform));

        let (render_bind_group, render_pipeline) = create_render_pipeline(
            &device,
            surface_format,
            &camera_buffer,
            instance_table.buffer(),
        );

        let gpu_timer = GpuTimer::new(&device, &queue);

        log::info!(
            "[GpuState::new] Initialization complete: {} instances, {} indices",
            instance_table.count(),
            scene.geometry.indices.len()
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size_tracker: SurfaceSizeTracker::new(size.width.max(1), size.height.max(1)),
            depth_view,
            camera,
            camera_uniform,
            camera_buffer,
            render_bind_group,
            render_pipeline,
            geometry,
            instance_table,
            indirect,
            culling,
            thresholds: LodThresholds::new(&engine_config.lod_distances),
            settings: FrameSettings {
                culling_enabled: engine_config.culling_enabled,
                lod_enabled: engine_config.lod_enabled,
            },
            timings: FrameTimings::new(),
            gpu_timer,
        })
    }

    /// Apply a window size. The old depth texture is replaced only after the
    /// new surface set is configured, and dropped once the device is idle so
    /// no in-flight frame still references it.
    fn resize(&mut self, width: u32, height: u32) {
        match self.size_tracker.observe(width, height) {
            SizeAction::Keep => {}
            SizeAction::Suspend => {
                log::info!("[GpuState::resize] Zero-area surface; rendering suspended");
            }
            SizeAction::Recreate(w, h) => {
                log::info!("[GpuState::resize] Recreating surface at {}x{}", w, h);
                self.config.width = w;
                self.config.height = h;
                self.surface.configure(&self.device, &self.config);

                let new_depth = create_depth_texture(&self.device, &self.config);
                let old_depth = std::mem::replace(&mut self.depth_view, new_depth);
                self.device.poll(wgpu::Maintain::Wait);
                drop(old_depth);

                self.camera.resize(w, h);
            }
        }
    }

    fn update(&mut self, input: &mut InputState, delta_time: f32) {
        let step = CAMERA_MOVE_SPEED * delta_time;
        if input.is_key_pressed(KeyCode::KeyW) {
            self.camera.move_forward(step);
        }
        if input.is_key_pressed(KeyCode::KeyS) {
            self.camera.move_forward(-step);
        }
        if input.is_key_pressed(KeyCode::KeyD) {
            self.camera.move_right(step);
        }
        if input.is_key_pressed(KeyCode::KeyA) {
            self.camera.move_right(-step);
        }
        if input.is_key_pressed(KeyCode::Space) {
            self.camera.move_up(step);
        }
        if input.is_key_pressed(KeyCode::ShiftLeft) {
            self.camera.move_up(-step);
        }

        if input.is_cursor_locked() {
            let (dx, dy) = input.take_mouse_delta();
            self.camera.rotate(
                dx * CAMERA_LOOK_SENSITIVITY,
                -dy * CAMERA_LOOK_SENSITIVITY,
            );
        }

        self.camera_uniform.update_view_proj(&self.camera);
    }

    /// One frame: cull pass, render pass, submit, present, timing.
    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let cpu_start = Instant::now();
        let settings = self.settings;

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&self.camera_uniform));

        let frustum = Frustum::from_camera(&self.camera);
        let uniforms = CullUniforms::new(
            &frustum,
            self.camera.position,
            self.instance_table.count(),
            &self.thresholds,
            settings,
        );
        self.culling.update_uniforms(&self.queue, &uniforms);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.culling.encode(
            &mut encoder,
            self.gpu_timer.as_ref().map(|t| t.compute_pass_writes()),
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Forward Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.02,
                            g: 0.02,
                            b: 0.04,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: self.gpu_timer.as_ref().map(|t| t.render_pass_writes()),
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &self.render_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.geometry.vertex_buffer.slice(..));
            render_pass.set_index_buffer(
                self.geometry.index_buffer.slice(..),
                wgpu::IndexFormat::Uint32,
            );
            // The count buffer holds the compacted draw count; capacity is
            // only the upper bound the driver clamps against.
            render_pass.multi_draw_indexed_indirect_count(
                self.indirect.draws(),
                0,
                self.indirect.count(),
                0,
                self.indirect.capacity(),
            );
        }

        if let Some(timer) = &self.gpu_timer {
            timer.encode_resolve(&mut encoder);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        if let Some(timer) = &self.gpu_timer {
            if let Some(gpu_ms) = timer.read_elapsed_ms(&self.device) {
                self.timings.record_gpu(gpu_ms);
            }
        }
        self.timings
            .record_cpu(cpu_start.elapsed().as_secs_f32() * 1000.0);
        self.window.set_title(&self.timings.window_title());

        Ok(())
    }

    fn toggle_culling(&mut self) {
        self.settings.culling_enabled = !self.settings.culling_enabled;
        log::info!(
            "[GpuState] Frustum culling {}",
            if self.settings.culling_enabled { "enabled" } else { "disabled" }
        );
    }

    fn toggle_lod(&mut self) {
        self.settings.lod_enabled = !self.settings.lod_enabled;
        log::info!(
            "[GpuState] LOD selection {}",
            if self.settings.lod_enabled { "enabled" } else { "disabled" }
        );
    }
}

fn create_depth_texture(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Depth32Float,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_render_pipeline(
    device: &wgpu::Device,
    surface_format: wgpu::TextureFormat,
    camera_buffer: &wgpu::Buffer,
    instance_buffer: &wgpu::Buffer,
) -> (wgpu::BindGroup, wgpu::RenderPipeline) {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Forward Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/draw.wgsl").into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Forward Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Forward Bind Group"),
        layout: &bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: instance_buffer.as_entire_binding(),
            },
        ],
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Forward Pipeline Layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Forward Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: "vs_main",
            buffers: &[Vertex::desc()],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: wgpu::TextureFormat::Depth32Float,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    });

    (bind_group, pipeline)
}

pub async fn run_app(event_loop: EventLoop<()>, config: EngineConfig) -> Result<()> {
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(&config.window_title)
            .with_inner_size(LogicalSize::new(config.window_width, config.window_height))
            .build(&event_loop)?,
    );

    let mut gpu_state = GpuState::new(window, &config).await?;
    let mut input_state = InputState::new();
    let mut last_frame = Instant::now();

    if gpu_state.window.set_cursor_grab(CursorGrabMode::Locked).is_ok() {
        gpu_state.window.set_cursor_visible(false);
        input_state.set_cursor_locked(true);
    }

    gpu_state.window.request_redraw();

    event_loop.run(move |event, elwt| {
        match event {
            Event::WindowEvent {
                ref event,
                window_id,
            } if window_id == gpu_state.window.id() => match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(physical_size) => {
                    gpu_state.resize(physical_size.width, physical_size.height);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if let PhysicalKey::Code(keycode) = event.physical_key {
                        // Toggles fire on the press edge only, so OS key
                        // repeat cannot flip them back and forth.
                        if event.state == ElementState::Pressed && !event.repeat {
                            match keycode {
                                KeyCode::Escape => elwt.exit(),
                                KeyCode::KeyC => gpu_state.toggle_culling(),
                                KeyCode::KeyL => gpu_state.toggle_lod(),
                                _ => {}
                            }
                        }
                        input_state.process_key(keycode, event.state);
                    }
                }
                WindowEvent::RedrawRequested => {
                    if gpu_state.size_tracker.is_suspended() {
                        return;
                    }

                    let now = Instant::now();
                    let delta_time = (now - last_frame).as_secs_f32();
                    last_frame = now;

                    gpu_state.update(&mut input_state, delta_time);

                    match gpu_state.render() {
                        Ok(_) => {}
                        Err(wgpu::SurfaceError::Lost) => {
                            log::warn!("[run_app] Surface lost; reconfiguring");
                            gpu_state.surface.configure(&gpu_state.device, &gpu_state.config);
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            log::error!("[run_app] Surface out of memory; exiting");
                            elwt.exit();
                        }
                        Err(e) => log::warn!("[run_app] Frame error: {:?}", e),
                    }
                }
                _ => {}
            },
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta },
                ..
            } => {
                if input_state.is_cursor_locked() {
                    input_state.process_mouse_motion(delta);
                }
            }
            Event::AboutToWait => {
                // Sleep on OS events while minimized instead of spinning
                if gpu_state.size_tracker.is_suspended() {
                    elwt.set_control_flow(ControlFlow::Wait);
                } else {
                    elwt.set_control_flow(ControlFlow::Poll);
                    gpu_state.window.request_redraw();
                }
            }
            _ => {}
        }
    })?;

    Ok(())
}
