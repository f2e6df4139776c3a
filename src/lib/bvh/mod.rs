mod aabb;
pub mod extract;

pub use aabb::{Aabb, Bounds};
pub use extract::{extract, Extraction};

// Child sentinel in node slots; both children are NO_CHILD exactly on leaves
pub const NO_CHILD: i32 = -1;

// Parent sentinel; only the root carries it
pub const NO_PARENT: u32 = u32::MAX;

// Node slot layout for N primitives: internal nodes occupy [0, N-1) with
// the root at slot 0, leaves occupy [N-1, 2N-1) in sorted-key order.
pub const fn leaf_slot(leaf_count: usize, sorted_pos: usize) -> usize {
    leaf_count - 1 + sorted_pos
}

pub const fn node_count(leaf_count: usize) -> usize {
    2 * leaf_count - 1
}

// One node of the final hierarchy, in the exact layout the kernels write
#[repr(C)]
#[derive(Clone, Copy, Debug)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
pub struct LbvhNode {
    pub left: i32,
    pub right: i32,
    pub primitive: u32,
    _p0: u32,
    pub bounds: Bounds,
}

impl LbvhNode {
    pub fn leaf(primitive: u32, bounds: Bounds) -> Self {
        Self {
            left: NO_CHILD,
            right: NO_CHILD,
            primitive,
            _p0: 0,
            bounds,
        }
    }

    // Internal nodes start with an empty box; propagation fills it in
    pub fn internal(left: u32, right: u32) -> Self {
        Self {
            left: left as i32,
            right: right as i32,
            primitive: u32::MAX,
            _p0: 0,
            bounds: Aabb::EMPTY.into(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left == NO_CHILD && self.right == NO_CHILD
    }
}

// Key/index pair produced by the Morton stage and reordered by the sorter
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
pub struct MortonEntry {
    pub code: u32,
    pub primitive: u32,
}

// Per-node scratch for the hierarchy and propagation stages; discarded
// once the build's node array has been read back
#[repr(C)]
#[derive(Clone, Copy, Debug)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
pub struct ConstructionInfo {
    pub parent: u32,
    pub visits: u32,
}

// (center, scale) pair for instanced wireframe-box rendering
#[repr(C)]
#[derive(Clone, Copy, Debug)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
pub struct AabbInstance {
    pub center: [f32; 3],
    _p0: u32,
    pub scale: [f32; 3],
    _p1: u32,
}

impl AabbInstance {
    pub fn new(center: [f32; 3], scale: [f32; 3]) -> Self {
        Self {
            center,
            _p0: 0,
            scale,
            _p1: 0,
        }
    }
}

// Host-side primitive: a triangle's tight box plus its original index
#[derive(Clone, Copy, Debug)]
pub struct Primitive {
    pub aabb: Aabb,
    pub index: u32,
}

// Device-side primitive record fed to the Morton and hierarchy kernels
#[repr(C)]
#[derive(Clone, Copy, Debug)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
pub struct PrimitiveRecord {
    pub bounds: Bounds,
    pub index: u32,
    _p0: [u32; 3],
}

impl From<&Primitive> for PrimitiveRecord {
    fn from(primitive: &Primitive) -> Self {
        Self {
            bounds: primitive.aabb.into(),
            index: primitive.index,
            _p0: [0; 3],
        }
    }
}
