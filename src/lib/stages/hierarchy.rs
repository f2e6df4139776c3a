use rayon::prelude::*;

use crate::bvh::{self, LbvhNode, MortonEntry, Primitive};

// Karras-style binary radix tree over the sorted key sequence. Every
// internal node's leaf range and split point follow from the keys alone,
// so each node is computed independently with no cross-thread ordering.
//
// Returns the 2N-1 node slots (internal at [0, N-1), leaves after) and
// one parent pointer per slot, NO_PARENT on the root.
pub fn build_topology(
    sorted: &[MortonEntry],
    primitives: &[Primitive],
) -> (Vec<LbvhNode>, Vec<u32>) {
    let n = sorted.len();

    // A single primitive is a hierarchy of exactly one leaf; the general
    // N-1 internal-node pass must not run at all
    if n == 1 {
        let primitive = sorted[0].primitive;
        let leaf = LbvhNode::leaf(
            primitive,
            primitives[primitive as usize].aabb.into(),
        );

        return (vec![leaf], vec![bvh::NO_PARENT]);
    }

    let total = bvh::node_count(n);

    let links = (0..n - 1)
        .into_par_iter()
        .map(|i| children_of(sorted, i))
        .collect::<Vec<_>>();

    let mut nodes = vec![LbvhNode::internal(0, 0); total];
    let mut parents = vec![bvh::NO_PARENT; total];

    for (i, &(left, right)) in links.iter().enumerate() {
        nodes[i] = LbvhNode::internal(left, right);
        parents[left as usize] = i as u32;
        parents[right as usize] = i as u32;
    }

    for (pos, entry) in sorted.iter().enumerate() {
        nodes[bvh::leaf_slot(n, pos)] = LbvhNode::leaf(
            entry.primitive,
            primitives[entry.primitive as usize].aabb.into(),
        );
    }

    (nodes, parents)
}

// Length of the common prefix between the augmented keys at sorted
// positions i and j; -1 when j falls outside the sequence. Duplicate
// Morton codes borrow the position bits as a 32-bit suffix, which keeps
// the order strict (this is where the sort's tie-break becomes
// load-bearing).
fn delta(sorted: &[MortonEntry], i: i64, j: i64) -> i64 {
    if j < 0 || j >= sorted.len() as i64 {
        return -1;
    }

    let ki = sorted[i as usize].code;
    let kj = sorted[j as usize].code;

    if ki == kj {
        32 + (i as u32 ^ j as u32).leading_zeros() as i64
    } else {
        (ki ^ kj).leading_zeros() as i64
    }
}

// Child slots of internal node i: direction, range end, and split per
// Karras 2012, sections 3-4
fn children_of(sorted: &[MortonEntry], i: usize) -> (u32, u32) {
    let n = sorted.len();
    let i = i as i64;

    let d: i64 = if delta(sorted, i, i + 1) >= delta(sorted, i, i - 1) {
        1
    } else {
        -1
    };

    // Upper-bound the range length, then binary-search its exact end
    let delta_min = delta(sorted, i, i - d);

    let mut l_max: i64 = 2;
    while delta(sorted, i, i + l_max * d) > delta_min {
        l_max *= 2;
    }

    let mut l: i64 = 0;
    let mut t = l_max / 2;
    while t >= 1 {
        if delta(sorted, i, i + (l + t) * d) > delta_min {
            l += t;
        }
        t /= 2;
    }

    let j = i + l * d;

    // Split position: the highest index sharing the node's full prefix
    let delta_node = delta(sorted, i, j);

    let mut s: i64 = 0;
    let mut t = (l + 1) / 2;
    loop {
        if delta(sorted, i, i + (s + t) * d) > delta_node {
            s += t;
        }

        if t <= 1 {
            break;
        }

        t = (t + 1) / 2;
    }

    let gamma = i + s * d + d.min(0);

    let left = if i.min(j) == gamma {
        bvh::leaf_slot(n, gamma as usize)
    } else {
        gamma as usize
    };

    let right = if i.max(j) == gamma + 1 {
        bvh::leaf_slot(n, gamma as usize + 1)
    } else {
        gamma as usize + 1
    };

    (left as u32, right as u32)
}

#[cfg(test)]
mod tests {
    use crate::bvh::Aabb;

    use super::*;

    fn primitives_for(count: u32) -> Vec<Primitive> {
        (0..count)
            .map(|i| {
                let mut aabb = Aabb::EMPTY;
                let f = i as f32;

                aabb.expand([f, f, f]);
                aabb.expand([f + 0.5, f + 0.5, f + 0.5]);

                Primitive { aabb, index: i }
            })
            .collect()
    }

    fn entries_for(codes: &[u32]) -> Vec<MortonEntry> {
        codes
            .iter()
            .enumerate()
            .map(|(i, &code)| MortonEntry { code, primitive: i as u32 })
            .collect()
    }

    #[test]
    fn single_primitive_yields_one_leaf() {
        let primitives = primitives_for(1);
        let sorted = entries_for(&[42]);

        let (nodes, parents) = build_topology(&sorted, &primitives);

        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].is_leaf());
        assert_eq!(nodes[0].primitive, 0);
        assert_eq!(parents, vec![bvh::NO_PARENT]);
    }

    #[test]
    fn two_primitives_yield_a_root_over_two_leaves() {
        let primitives = primitives_for(2);
        let sorted = entries_for(&[1, 8]);

        let (nodes, parents) = build_topology(&sorted, &primitives);

        assert_eq!(nodes.len(), 3);
        assert!(!nodes[0].is_leaf());
        assert_eq!(nodes[0].left, 1);
        assert_eq!(nodes[0].right, 2);
        assert!(nodes[1].is_leaf() && nodes[2].is_leaf());
        assert_eq!(parents, vec![bvh::NO_PARENT, 0, 0]);
    }

    #[test]
    fn every_slot_is_reached_exactly_once_from_the_root() {
        let codes = [3u32, 3, 9, 17, 17, 17, 80, 81, 200, 1000, 1001, 4000];
        let primitives = primitives_for(codes.len() as u32);
        let sorted = entries_for(&codes);

        let (nodes, parents) = build_topology(&sorted, &primitives);

        assert_eq!(nodes.len(), 2 * codes.len() - 1);

        let mut visited = vec![false; nodes.len()];
        let mut stack = vec![0usize];

        while let Some(slot) = stack.pop() {
            assert!(!visited[slot], "slot {} reached twice", slot);
            visited[slot] = true;

            if !nodes[slot].is_leaf() {
                for child in [nodes[slot].left, nodes[slot].right] {
                    assert_eq!(parents[child as usize], slot as u32);
                    stack.push(child as usize);
                }
            }
        }

        assert!(visited.iter().all(|&v| v));

        let leaves = nodes.iter().filter(|node| node.is_leaf()).count();
        assert_eq!(leaves, codes.len());
    }

    #[test]
    fn duplicate_keys_still_produce_a_valid_tree() {
        let codes = [5u32; 7];
        let primitives = primitives_for(7);
        let sorted = entries_for(&codes);

        let (nodes, parents) = build_topology(&sorted, &primitives);

        assert_eq!(nodes.len(), 13);
        assert_eq!(parents[0], bvh::NO_PARENT);

        // Each non-root slot has exactly one parent naming it as a child
        for slot in 1..nodes.len() {
            let p = parents[slot] as usize;
            assert!(
                nodes[p].left == slot as i32 || nodes[p].right == slot as i32
            );
        }
    }
}
