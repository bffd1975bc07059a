//! Scene setup: procedural geometry plus the scattered instance population

pub mod geometry;

use cgmath::{Deg, InnerSpace, Quaternion, Rotation3, Vector3};
use log::info;
use rand::prelude::*;

use crate::renderer::{InstanceData, MAX_LOD_LEVELS};
use crate::EngineConfig;
use geometry::{cube, sphere_lod_chain};

pub use geometry::GeometryStore;

pub struct Scene {
    pub geometry: GeometryStore,
    pub instances: Vec<InstanceData>,
}

impl Scene {
    /// Build the geometry pool and scatter instances inside the scene
    /// radius. The rng is seeded so a given config always produces the same
    /// scene, which keeps frame-time comparisons meaningful across runs.
    pub fn generate(config: &EngineConfig) -> Self {
        info!(
            "[Scene::generate] Scattering {} instances within radius {}",
            config.instance_count, config.scene_radius
        );

        let mut geometry = GeometryStore::default();
        geometry.add_mesh(&sphere_lod_chain(), [0.0; 3], 1.0);
        geometry.add_mesh(&[cube()], [0.0; 3], 3f32.sqrt());

        let mut rng = StdRng::seed_from_u64(0);
        let instances = (0..config.instance_count)
            .map(|id| {
                let mesh = &geometry.meshes[id as usize % geometry.meshes.len()];
                scatter_instance(&mut rng, id, mesh, config.scene_radius)
            })
            .collect();

        Self {
            geometry,
            instances,
        }
    }
}

fn scatter_instance(
    rng: &mut StdRng,
    id: u32,
    mesh: &geometry::Mesh,
    scene_radius: f32,
) -> InstanceData {
    let position = [
        rng.gen_range(-scene_radius..scene_radius),
        rng.gen_range(-scene_radius..scene_radius),
        rng.gen_range(-scene_radius..scene_radius),
    ];
    let scale = rng.gen_range(2.0..4.0);

    let axis = Vector3::new(
        rng.gen_range(-1.0f32..1.0),
        rng.gen_range(-1.0f32..1.0),
        rng.gen_range(-1.0f32..1.0),
    );
    let axis = if axis.magnitude2() > 1e-6 {
        axis.normalize()
    } else {
        Vector3::unit_y()
    };
    let rotation = Quaternion::from_axis_angle(axis, Deg(rng.gen_range(0.0..90.0)));

    let mut lod_index_count = [0u32; MAX_LOD_LEVELS];
    let mut lod_first_index = [0u32; MAX_LOD_LEVELS];
    for (level, lod) in mesh.lods.iter().enumerate() {
        lod_index_count[level] = lod.index_count;
        lod_first_index[level] = lod.first_index;
    }

    InstanceData {
        position,
        scale,
        orientation: [rotation.v.x, rotation.v.y, rotation.v.z, rotation.s],
        bounds_center: mesh.bounds_center,
        bounds_radius: mesh.bounds_radius,
        lod_index_count,
        lod_first_index,
        base_vertex: mesh.base_vertex,
        instance_id: id,
        lod_count: mesh.lods.len() as u32,
        _pad: 0,
    }
}
