use crate::error::BuildError;
use crate::geom::V3;

use super::{Aabb, Primitive};

// Output of the extraction pass: one tight box per triangle plus the
// running union of every vertex the triangles touch
pub struct Extraction {
    pub primitives: Vec<Primitive>,
    pub scene_bounds: Aabb,
}

impl Extraction {
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }
}

// Walks the index triples, resolving each triangle's vertices into a
// local AABB and expanding the global one. All validation happens here,
// before any device buffer exists: an out-of-range index or an
// all-axes-collapsed scene aborts the build with nothing allocated.
pub fn extract(
    positions: &[V3<f32>],
    indices: &[u32],
    eps: f32,
) -> Result<Extraction, BuildError> {
    let triangles = indices.len() / 3;

    if triangles == 0 {
        return Err(BuildError::input("no triangles to build from"));
    }

    let mut primitives = Vec::with_capacity(triangles);
    let mut scene_bounds = Aabb::EMPTY;

    for (i, tri) in indices.chunks_exact(3).enumerate() {
        let [a, b, c] = [tri[0], tri[1], tri[2]];

        for &idx in &[a, b, c] {
            if idx as usize >= positions.len() {
                return Err(BuildError::input(format!(
                    "triangle {} references vertex {} but only {} positions exist",
                    i, idx, positions.len(),
                )));
            }
        }

        let mut aabb = Aabb::EMPTY;
        aabb.expand(positions[a as usize]);
        aabb.expand(positions[b as usize]);
        aabb.expand(positions[c as usize]);

        scene_bounds = scene_bounds.union(aabb);

        primitives.push(Primitive { aabb, index: i as u32 });
    }

    if scene_bounds.is_collapsed(eps) {
        return Err(BuildError::DegenerateScene(scene_bounds.extent()));
    }

    Ok(Extraction { primitives, scene_bounds })
}
