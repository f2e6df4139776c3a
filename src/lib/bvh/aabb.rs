use crate::geom::{V3, V3Ops as _};

// Host-side axis-aligned bounding box. Starts empty (min = +MAX,
// max = -MAX) and only ever grows through `expand`/`union`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: V3<f32>,
    pub max: V3<f32>,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: [f32::MAX; 3],
        max: [-f32::MAX; 3],
    };

    pub fn expand(&mut self, point: V3<f32>) {
        self.min = self.min.vmin(point);
        self.max = self.max.vmax(point);
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.vmin(other.min),
            max: self.max.vmax(other.max),
        }
    }

    pub fn extent(&self) -> V3<f32> {
        self.max.sub(self.min)
    }

    pub fn centroid(&self) -> V3<f32> {
        self.min.add(self.max).scale(0.5)
    }

    // The extent used for Morton normalization; clamped away from zero
    // so a flat scene never divides by zero
    pub fn clamped_extent(&self, eps: f32) -> V3<f32> {
        self.extent().vmax([eps; 3])
    }

    // Degenerate in the scene sense: collapsed on EVERY axis
    pub fn is_collapsed(&self, eps: f32) -> bool {
        let e = self.extent();

        e[0] <= eps && e[1] <= eps && e[2] <= eps
    }

    // Renderable in the instance sense: finite and wider than eps on
    // every axis
    pub fn is_renderable(&self, eps: f32) -> bool {
        let finite = self.min.iter().chain(self.max.iter()).all(|v| v.is_finite());
        let e = self.extent();

        finite && e[0] > eps && e[1] > eps && e[2] > eps
    }

    pub fn encloses(&self, other: &Self) -> bool {
        self.min[0] <= other.min[0] &&
        self.min[1] <= other.min[1] &&
        self.min[2] <= other.min[2] &&
        self.max[0] >= other.max[0] &&
        self.max[1] >= other.max[1] &&
        self.max[2] >= other.max[2]
    }
}

// GPU mirror of Aabb with the 16-byte vec3 alignment WGSL expects
#[repr(C)]
#[derive(Clone, Copy, Debug)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
pub struct Bounds {
    pub min: [f32; 3],
    _p0: u32,
    pub max: [f32; 3],
    _p1: u32,
}

impl From<Aabb> for Bounds {
    fn from(aabb: Aabb) -> Self {
        Self {
            min: aabb.min,
            _p0: 0,
            max: aabb.max,
            _p1: 0,
        }
    }
}

impl From<Bounds> for Aabb {
    fn from(bounds: Bounds) -> Self {
        Self {
            min: bounds.min,
            max: bounds.max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_expands_to_a_point() {
        let mut aabb = Aabb::EMPTY;

        aabb.expand([1., 2., 3.]);

        assert_eq!(aabb.min, [1., 2., 3.]);
        assert_eq!(aabb.max, [1., 2., 3.]);
    }

    #[test]
    fn expand_never_shrinks() {
        let mut aabb = Aabb::EMPTY;

        aabb.expand([0., 0., 0.]);
        aabb.expand([1., -1., 2.]);
        aabb.expand([0.5, 0.5, 0.5]);

        assert_eq!(aabb.min, [0., -1., 0.]);
        assert_eq!(aabb.max, [1., 0.5, 2.]);
    }

    #[test]
    fn union_is_exact_componentwise() {
        let mut a = Aabb::EMPTY;
        let mut b = Aabb::EMPTY;

        a.expand([0., 0., 0.]);
        a.expand([1., 1., 1.]);
        b.expand([-2., 0.5, 0.]);
        b.expand([0., 3., 0.5]);

        let u = a.union(b);

        assert_eq!(u.min, [-2., 0., 0.]);
        assert_eq!(u.max, [1., 3., 1.]);
        assert!(u.encloses(&a) && u.encloses(&b));
    }

    #[test]
    fn collapsed_only_when_flat_on_all_axes() {
        let mut flat = Aabb::EMPTY;
        flat.expand([1., 1., 1.]);

        let mut planar = Aabb::EMPTY;
        planar.expand([0., 0., 0.]);
        planar.expand([1., 1., 0.]);

        assert!(flat.is_collapsed(1e-4));
        assert!(!planar.is_collapsed(1e-4));
        assert!(!planar.is_renderable(1e-4));
    }
}
