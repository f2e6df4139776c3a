use std::cmp;

use rayon::prelude::*;

use crate::bvh::MortonEntry;

// Ascending by key, ties broken by ascending primitive index. The
// tie-break makes the order total, which is what lets the hierarchy
// stage treat the sequence as having no duplicate keys -- and what makes
// an unstable parallel sort deterministic here.
pub fn order(a: &MortonEntry, b: &MortonEntry) -> cmp::Ordering {
    a.code.cmp(&b.code).then(a.primitive.cmp(&b.primitive))
}

pub fn sort_entries(entries: &mut [MortonEntry]) {
    entries.par_sort_unstable_by(order);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_end_up_non_decreasing() {
        let mut entries = (0..256u32)
            .map(|i| MortonEntry {
                // Scrambled, with plenty of collisions
                code: (i * 37) % 64,
                primitive: i,
            })
            .collect::<Vec<_>>();

        sort_entries(&mut entries);

        for pair in entries.windows(2) {
            assert!(pair[0].code <= pair[1].code);
        }
    }

    #[test]
    fn equal_keys_keep_ascending_primitive_order() {
        let mut entries = vec![
            MortonEntry { code: 7, primitive: 4 },
            MortonEntry { code: 7, primitive: 1 },
            MortonEntry { code: 3, primitive: 9 },
            MortonEntry { code: 7, primitive: 0 },
        ];

        sort_entries(&mut entries);

        assert_eq!(entries[0], MortonEntry { code: 3, primitive: 9 });
        assert_eq!(entries[1], MortonEntry { code: 7, primitive: 0 });
        assert_eq!(entries[2], MortonEntry { code: 7, primitive: 1 });
        assert_eq!(entries[3], MortonEntry { code: 7, primitive: 4 });
    }
}
