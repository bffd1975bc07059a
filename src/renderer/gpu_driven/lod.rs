use super::instance_table::MAX_LOD_LEVELS;

/// Global distance thresholds shared by every instance
///
/// `count` thresholds partition camera distance into `count + 1` bands;
/// an instance clamps the band index to its own mesh's LOD count.
#[derive(Copy, Clone, Debug)]
pub struct LodThresholds {
    distances: [f32; MAX_LOD_LEVELS - 1],
    count: usize,
}

impl LodThresholds {
    /// Thresholds must be strictly ascending and positive; EngineConfig
    /// validation enforces this before we get here.
    pub fn new(distances: &[f32]) -> Self {
        debug_assert!(distances.len() < MAX_LOD_LEVELS);
        debug_assert!(distances.windows(2).all(|w| w[0] < w[1]));

        let mut padded = [f32::MAX; MAX_LOD_LEVELS - 1];
        padded[..distances.len()].copy_from_slice(distances);
        Self {
            distances: padded,
            count: distances.len(),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// LOD level for a given camera distance: the number of thresholds
    /// strictly below the distance, clamped to the mesh's available levels.
    pub fn select(&self, distance: f32, lod_count: u32) -> u32 {
        let mut level = 0u32;
        for i in 0..self.count {
            if distance > self.distances[i] {
                level += 1;
            }
        }
        level.min(lod_count.saturating_sub(1))
    }

    /// Padded vec4 for the cull uniform; unused slots hold f32::MAX so the
    /// kernel can compare against all lanes unconditionally.
    pub fn to_gpu(&self) -> [f32; 4] {
        [self.distances[0], self.distances[1], self.distances[2], 0.0]
    }
}
