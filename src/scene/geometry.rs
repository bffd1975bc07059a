//! Procedural meshes and the shared geometry buffers
//!
//! All meshes live in one vertex buffer and one index buffer. A mesh owns a
//! contiguous vertex block (one `base_vertex` for all of its LOD levels) and
//! per LOD an index range whose values are local to that block.

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Index range of one LOD level, local to the mesh's vertex block
#[derive(Copy, Clone, Debug)]
pub struct LodRange {
    pub first_index: u32,
    pub index_count: u32,
}

pub struct Mesh {
    pub base_vertex: u32,
    pub lods: Vec<LodRange>,
    pub bounds_center: [f32; 3],
    pub bounds_radius: f32,
}

/// CPU-side geometry pool; built at scene load, uploaded once
#[derive(Default)]
pub struct GeometryStore {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub meshes: Vec<Mesh>,
}

impl GeometryStore {
    /// Append a mesh from its LOD levels, finest first. Each level's indices
    /// refer to that level's own vertex list; the store rebases them onto the
    /// mesh's shared vertex block.
    pub fn add_mesh(
        &mut self,
        levels: &[(Vec<Vertex>, Vec<u32>)],
        bounds_center: [f32; 3],
        bounds_radius: f32,
    ) -> usize {
        assert!(!levels.is_empty() && levels.len() <= crate::renderer::MAX_LOD_LEVELS);

        let base_vertex = self.vertices.len() as u32;
        let mut local_vertex_offset = 0u32;
        let mut lods = Vec::with_capacity(levels.len());

        for (vertices, indices) in levels {
            let first_index = self.indices.len() as u32;
            self.vertices.extend_from_slice(vertices);
            self.indices
                .extend(indices.iter().map(|i| i + local_vertex_offset));
            lods.push(LodRange {
                first_index,
                index_count: indices.len() as u32,
            });
            local_vertex_offset += vertices.len() as u32;
        }

        self.meshes.push(Mesh {
            base_vertex,
            lods,
            bounds_center,
            bounds_radius,
        });
        self.meshes.len() - 1
    }

    pub fn upload(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> GpuGeometry {
        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shared Vertex Buffer"),
            size: (self.vertices.len() * std::mem::size_of::<Vertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shared Index Buffer"),
            size: (self.indices.len() * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&vertex_buffer, 0, bytemuck::cast_slice(&self.vertices));
        queue.write_buffer(&index_buffer, 0, bytemuck::cast_slice(&self.indices));

        GpuGeometry {
            vertex_buffer,
            index_buffer,
        }
    }
}

pub struct GpuGeometry {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
}

/// Unit UV sphere; positions double as normals
pub fn uv_sphere(stacks: u32, slices: u32) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for stack in 0..=stacks {
        let phi = std::f32::consts::PI * stack as f32 / stacks as f32;
        for slice in 0..=slices {
            let theta = 2.0 * std::f32::consts::PI * slice as f32 / slices as f32;
            let p = [
                phi.sin() * theta.cos(),
                phi.cos(),
                phi.sin() * theta.sin(),
            ];
            vertices.push(Vertex {
                position: p,
                normal: p,
            });
        }
    }

    let ring = slices + 1;
    for stack in 0..stacks {
        for slice in 0..slices {
            let a = stack * ring + slice;
            let b = a + ring;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }

    (vertices, indices)
}

/// Unit-radius sphere LOD chain, finest to coarsest
pub fn sphere_lod_chain() -> Vec<(Vec<Vertex>, Vec<u32>)> {
    vec![uv_sphere(16, 24), uv_sphere(8, 12), uv_sphere(4, 6)]
}

/// Axis-aligned cube with flat-shaded faces, half extent 1
pub fn cube() -> (Vec<Vertex>, Vec<u32>) {
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, tangent, bitangent) in faces {
        let base = vertices.len() as u32;
        for (u, v) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = [
                normal[0] + tangent[0] * u + bitangent[0] * v,
                normal[1] + tangent[1] * u + bitangent[1] * v,
                normal[2] + tangent[2] * u + bitangent[2] * v,
            ];
            vertices.push(Vertex { position, normal });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_chain_gets_coarser_per_level() {
        let chain = sphere_lod_chain();
        for pair in chain.windows(2) {
            assert!(pair[1].1.len() < pair[0].1.len());
        }
    }

    #[test]
    fn mesh_indices_stay_inside_the_vertex_block() {
        let mut store = GeometryStore::default();
        let mesh_index = store.add_mesh(&sphere_lod_chain(), [0.0; 3], 1.0);
        let mesh = &store.meshes[mesh_index];

        let block_len: u32 = sphere_lod_chain().iter().map(|(v, _)| v.len() as u32).sum();
        for lod in &mesh.lods {
            let range = lod.first_index as usize..(lod.first_index + lod.index_count) as usize;
            for &index in &store.indices[range] {
                assert!(index < block_len);
            }
        }
    }

    #[test]
    fn second_mesh_rebases_onto_its_own_block() {
        let mut store = GeometryStore::default();
        store.add_mesh(&sphere_lod_chain(), [0.0; 3], 1.0);
        let cube_index = store.add_mesh(&[cube()], [0.0; 3], 3f32.sqrt());
        let mesh = &store.meshes[cube_index];

        assert_eq!(
            mesh.base_vertex as usize + 24,
            store.vertices.len()
        );
        let lod = mesh.lods[0];
        assert_eq!(lod.index_count, 36);
        // Cube indices are local, so the max must be below its 24 vertices
        let range = lod.first_index as usize..(lod.first_index + lod.index_count) as usize;
        assert!(store.indices[range].iter().all(|&i| i < 24));
    }

    #[test]
    fn sphere_triangles_wind_consistently() {
        let (vertices, indices) = uv_sphere(8, 12);
        assert_eq!(indices.len() % 3, 0);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }
}
