pub mod v3;

pub use v3::{V3, V3Ops};

// Column-major 4x4 transform, matching the layout the scene collaborator
// hands over on rebuild
pub type M4 = [[f32; 4]; 4];

pub const M4_IDENTITY: M4 = [
    [1., 0., 0., 0.],
    [0., 1., 0., 0.],
    [0., 0., 1., 0.],
    [0., 0., 0., 1.],
];

// Applies `m` to a point (w = 1); the result is not perspective-divided
// because the builder only ever sees affine model transforms
pub fn transform_point(m: &M4, p: V3<f32>) -> V3<f32> {
    [
        m[0][0] * p[0] + m[1][0] * p[1] + m[2][0] * p[2] + m[3][0],
        m[0][1] * p[0] + m[1][1] * p[1] + m[2][1] * p[2] + m[3][1],
        m[0][2] * p[0] + m[1][2] * p[1] + m[2][2] * p[2] + m[3][2],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_leaves_points_alone() {
        let p = [1.5, -2., 0.25];

        assert_eq!(transform_point(&M4_IDENTITY, p), p);
    }

    #[test]
    fn translation_lands_in_last_column() {
        let mut m = M4_IDENTITY;

        m[3] = [5., 7., -3., 1.];

        assert_eq!(transform_point(&m, [1., 2., 3.]), [6., 9., 0.]);
    }
}
