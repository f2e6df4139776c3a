use rayon::prelude::*;

use crate::bvh::{Aabb, MortonEntry, Primitive};
use crate::geom::V3;

// Quantized coordinates land in [0, 2^bits - 1]
const AXIS_BUCKETS: f32 = (1u32 << crate::MORTON_BITS_PER_AXIS) as f32;
const AXIS_MAX: u32 = (1 << crate::MORTON_BITS_PER_AXIS) - 1;

// Spreads the low 10 bits of `v` so two zero bits separate each of them
pub fn expand_bits(v: u32) -> u32 {
    let mut x = v & AXIS_MAX;

    x = (x | (x << 16)) & 0x0300_00ff;
    x = (x | (x << 8)) & 0x0300_f00f;
    x = (x | (x << 4)) & 0x030c_30c3;
    x = (x | (x << 2)) & 0x0924_9249;
    x
}

// Interleaves a unit-cube point into a 30-bit Morton key (x highest)
pub fn encode(unit: V3<f32>) -> u32 {
    let quantize = |v: f32| -> u32 {
        ((v * AXIS_BUCKETS) as u32).min(AXIS_MAX)
    };

    (expand_bits(quantize(unit[0])) << 2)
        | (expand_bits(quantize(unit[1])) << 1)
        | expand_bits(quantize(unit[2]))
}

// Keys every primitive by its centroid's position inside the scene box.
// Pure function of the geometry and the box: identical input always
// yields identical keys.
pub fn assign_codes(
    primitives: &[Primitive],
    scene_bounds: &Aabb,
    eps: f32,
) -> Vec<MortonEntry> {
    let scene_min = scene_bounds.min;
    let scene_extent = scene_bounds.clamped_extent(eps);

    primitives
        .par_iter()
        .map(|primitive| {
            let centroid = primitive.aabb.centroid();

            let unit = [
                ((centroid[0] - scene_min[0]) / scene_extent[0]).clamp(0., 1.),
                ((centroid[1] - scene_min[1]) / scene_extent[1]).clamp(0., 1.),
                ((centroid[2] - scene_min[2]) / scene_extent[2]).clamp(0., 1.),
            ];

            MortonEntry {
                code: encode(unit),
                primitive: primitive.index,
            }
        })
        .collect()
}
