use log::warn;

/// Weight of the newest sample in the moving average
pub const FRAME_TIME_EMA_WEIGHT: f32 = 0.05;

/// Smoothed CPU and GPU frame times in milliseconds
#[derive(Debug, Default)]
pub struct FrameTimings {
    cpu_ms: f32,
    gpu_ms: f32,
}

impl FrameTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cpu(&mut self, sample_ms: f32) {
        self.cpu_ms = ema(self.cpu_ms, sample_ms);
    }

    pub fn record_gpu(&mut self, sample_ms: f32) {
        self.gpu_ms = ema(self.gpu_ms, sample_ms);
    }

    pub fn cpu_ms(&self) -> f32 {
        self.cpu_ms
    }

    pub fn gpu_ms(&self) -> f32 {
        self.gpu_ms
    }

    pub fn window_title(&self) -> String {
        format!("cpu: {:.2} ms; gpu: {:.2} ms", self.cpu_ms, self.gpu_ms)
    }
}

fn ema(average: f32, sample: f32) -> f32 {
    average * (1.0 - FRAME_TIME_EMA_WEIGHT) + sample * FRAME_TIME_EMA_WEIGHT
}

/// Two-timestamp GPU timer bracketing the frame's device work
///
/// Timestamp 0 is written at the start of the cull pass, timestamp 1 at the
/// end of the render pass. `None` when the adapter lacks TIMESTAMP_QUERY;
/// GPU time then reports 0 and only CPU timing is shown.
pub struct GpuTimer {
    query_set: wgpu::QuerySet,
    resolve_buffer: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,
    period_ns: f32,
}

impl GpuTimer {
    const QUERY_COUNT: u32 = 2;

    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Option<Self> {
        if !device.features().contains(wgpu::Features::TIMESTAMP_QUERY) {
            warn!("[GpuTimer::new] TIMESTAMP_QUERY unavailable; GPU frame time will read 0");
            return None;
        }

        let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("Frame Timestamp Query Set"),
            ty: wgpu::QueryType::Timestamp,
            count: Self::QUERY_COUNT,
        });

        let size = (Self::QUERY_COUNT as u64) * std::mem::size_of::<u64>() as u64;
        let resolve_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Timestamp Resolve Buffer"),
            size,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Timestamp Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Some(Self {
            query_set,
            resolve_buffer,
            staging_buffer,
            period_ns: queue.get_timestamp_period(),
        })
    }

    pub fn compute_pass_writes(&self) -> wgpu::ComputePassTimestampWrites {
        wgpu::ComputePassTimestampWrites {
            query_set: &self.query_set,
            beginning_of_pass_write_index: Some(0),
            end_of_pass_write_index: None,
        }
    }

    pub fn render_pass_writes(&self) -> wgpu::RenderPassTimestampWrites {
        wgpu::RenderPassTimestampWrites {
            query_set: &self.query_set,
            beginning_of_pass_write_index: None,
            end_of_pass_write_index: Some(1),
        }
    }

    /// Record the resolve + copy after the passes in the same encoder
    pub fn encode_resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.resolve_query_set(&self.query_set, 0..Self::QUERY_COUNT, &self.resolve_buffer, 0);
        encoder.copy_buffer_to_buffer(
            &self.resolve_buffer,
            0,
            &self.staging_buffer,
            0,
            self.staging_buffer.size(),
        );
    }

    /// Read back the elapsed GPU time for the submitted frame, in ms.
    /// Blocks on device idle, so only call once the frame must complete.
    pub fn read_elapsed_ms(&self, device: &wgpu::Device) -> Option<f32> {
        let slice = self.staging_buffer.slice(..);
        let (tx, rx) = flume::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            _ => {
                warn!("[GpuTimer::read_elapsed_ms] timestamp readback failed");
                return None;
            }
        }

        let elapsed = {
            let data = slice.get_mapped_range();
            let stamps: &[u64] = bytemuck::cast_slice(&data);
            stamps[1].saturating_sub(stamps[0])
        };
        self.staging_buffer.unmap();

        Some(elapsed as f32 * self.period_ns / 1_000_000.0)
    }
}
