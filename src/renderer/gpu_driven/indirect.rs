use bytemuck::{Pod, Zeroable};

/// Indexed indirect draw arguments, matching wgpu's expected buffer layout
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedIndirectArgs {
    /// Number of indices to draw
    pub index_count: u32,
    /// Always 1; every record draws a single instance
    pub instance_count: u32,
    /// First index in the shared index buffer
    pub first_index: u32,
    /// Value added to each index before vertex fetch
    pub base_vertex: i32,
    /// Instance id of the record that produced this draw
    pub first_instance: u32,
}

/// Draw buffer + count buffer pair
///
/// Written only by the culling kernel, consumed only by
/// `multi_draw_indexed_indirect_count`. The count cell is the single source
/// of truth for how many draws exist in a frame; the host never maps either
/// buffer.
pub struct IndirectBuffers {
    draws: wgpu::Buffer,
    count: wgpu::Buffer,
    capacity: u32,
}

impl IndirectBuffers {
    pub fn new(device: &wgpu::Device, capacity: u32) -> Self {
        assert!(capacity > 0, "indirect buffer capacity must be non-zero");

        // COPY_SRC is for offline validation copies only; the frame loop
        // never reads either buffer back.
        let draws = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Indirect Draw Buffer"),
            size: (std::mem::size_of::<DrawIndexedIndirectArgs>() * capacity as usize) as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let count = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw Count Buffer"),
            size: std::mem::size_of::<u32>() as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        Self {
            draws,
            count,
            capacity,
        }
    }

    pub fn draws(&self) -> &wgpu::Buffer {
        &self.draws
    }

    pub fn count(&self) -> &wgpu::Buffer {
        &self.count
    }

    /// Upper bound passed to the indirect-count draw call
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_match_the_wgpu_indirect_layout() {
        // Five tightly packed 32-bit words
        assert_eq!(std::mem::size_of::<DrawIndexedIndirectArgs>(), 20);
    }
}
