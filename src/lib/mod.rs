pub mod geom;
pub mod bvh;
pub mod error;
pub mod logs;
pub mod stages;
pub mod shaders;
pub mod gpu;
pub mod builder;

pub use builder::{BuildResult, LbvhBuilder};
pub use error::BuildError;

use geom::V3;

// Lanes per compute workgroup. A scheduling parameter, not a correctness
// requirement; the sort kernel assumes it matches its internal stride.
pub const WORKGROUP_SIZE: u32 = 256;

// Quantization width for Morton keys: 10 bits per axis, interleaved
// into a 30-bit key inside one u32.
pub const MORTON_BITS_PER_AXIS: u32 = 10;

// Construction tunables for the builder and its visualization output
#[derive(Clone, Copy)]
pub struct Config {
    // Below this extent an AABB counts as degenerate, and the scene
    // extent is clamped to it before Morton normalization
    pub degenerate_eps: f32,

    // Added to every instance center before emission; a rendering
    // alignment knob, not a property of the hierarchy
    pub instance_offset: V3<f32>,

    // At most this many degenerate-node warnings are logged per build
    pub warn_limit: u32,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            degenerate_eps: 1e-4,
            instance_offset: [0.; 3],
            warn_limit: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self { Self::new() }
}
