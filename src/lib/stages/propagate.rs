use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use crate::bvh::{self, Aabb, LbvhNode};

// Shared node-slot writer for the upward walks. Distinct walks only ever
// write distinct internal slots (the visitation counter admits exactly one
// walk per node), so the raw writes never alias.
struct NodeSlots {
    ptr: *mut LbvhNode,
}

unsafe impl Sync for NodeSlots {}

// Bottom-up box propagation: one walk starts at each leaf and climbs
// toward the root, dying at every node whose sibling subtree has not
// arrived yet. The second arriver unions its children and continues, so
// each internal box is written exactly once, after both children are
// final.
pub fn propagate_bounds(nodes: &mut [LbvhNode], parents: &[u32]) {
    let leaf_count = (nodes.len() + 1) / 2;

    if leaf_count < 2 {
        return;
    }

    let counters = (0..nodes.len())
        .map(|_| AtomicU32::new(0))
        .collect::<Vec<_>>();

    let slots = NodeSlots {
        ptr: nodes.as_mut_ptr(),
    };

    (0..leaf_count).into_par_iter().for_each(|pos| {
        // Capture the wrapper itself, not its pointer field; the Sync
        // promise lives on the struct
        let slots = &slots;

        let mut cur = parents[bvh::leaf_slot(leaf_count, pos)];

        while cur != bvh::NO_PARENT {
            // AcqRel on the counter publishes the loser's subtree writes
            // to the walk that continues
            if counters[cur as usize].fetch_add(1, Ordering::AcqRel) == 0 {
                return;
            }

            unsafe {
                let node = &mut *slots.ptr.add(cur as usize);

                let left = &*slots.ptr.add(node.left as usize);
                let right = &*slots.ptr.add(node.right as usize);

                let bounds = Aabb::from(left.bounds)
                    .union(right.bounds.into());

                node.bounds = bounds.into();
            }

            cur = parents[cur as usize];
        }
    });
}
