use super::LiveRange;
use crate::util::SegmentTree;

/// Index answering which live ranges cover a given address
pub struct LiveRangeTree<'a> {
    tree: SegmentTree<&'a LiveRange>,
}

impl<'a> LiveRangeTree<'a> {
    pub fn new(ranges: &'a [LiveRange]) -> LiveRangeTree<'a> {
        LiveRangeTree {
            tree: SegmentTree::new(ranges.iter().collect()),
        }
    }

    /// Ranges live at the address (in no particular order)
    pub fn live_at(&self, address: usize) -> Vec<&'a LiveRange> {
        self.tree
            .intervals_containing(address)
            .into_iter()
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{JavaType, VarId};

    fn range(variable: usize, assign_address: usize, last_use_address: usize) -> LiveRange {
        LiveRange {
            variable: VarId(variable),
            ty: JavaType::Int,
            assign_address,
            last_use_address,
        }
    }

    #[test]
    fn matches_linear_search() {
        let ranges = vec![
            range(0, 0, 3),
            range(1, 1, 1),
            range(2, 2, 9),
            range(3, 4, 6),
            range(4, 12, 14),
        ];
        let tree = LiveRangeTree::new(&ranges);
        for address in 0..16 {
            let mut found: Vec<VarId> = tree.live_at(address).iter().map(|r| r.variable).collect();
            found.sort();
            let expected: Vec<VarId> = ranges
                .iter()
                .filter(|r| r.contains(address))
                .map(|r| r.variable)
                .collect();
            assert_eq!(found, expected, "at address {}", address);
        }
    }

    #[test]
    fn no_ranges() {
        let tree = LiveRangeTree::new(&[]);
        assert!(tree.live_at(0).is_empty());
    }
}
