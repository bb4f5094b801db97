use std::collections::BTreeSet;
use std::ops::RangeInclusive;

/// Segment tree over closed intervals of addresses
///
/// The leaves are the elementary segments between consecutive interval boundaries, so every
/// address between the smallest start and the largest end falls in exactly one leaf. Intervals
/// get cloned once per node on which they get stored; wrap them in a reference to keep that
/// cheap.
#[derive(Debug)]
pub struct SegmentTree<I: Interval + Clone>(Option<SegmentNode<I>>);

impl<I: Interval + Clone> SegmentTree<I> {
    /// Find all intervals containing the specified point
    pub fn intervals_containing(&self, point: usize) -> Vec<&I> {
        let mut node = match self.0.as_ref() {
            Some(root_node) if root_node.contains(point) => root_node,
            _ => return vec![],
        };

        // These are all the intervals encountered while searching for the point
        let mut containing_intervals: Vec<&I> = vec![];
        loop {
            // All intervals on this node contain the point
            containing_intervals.extend(node.intervals().iter());

            // Exactly one child contains the point
            if let SegmentNode::Inner {
                left_child,
                right_child,
                ..
            } = node
            {
                node = if left_child.contains(point) {
                    &**left_child
                } else {
                    &**right_child
                };
                continue;
            }
            break;
        }

        containing_intervals
    }

    /// Make a new segment tree containing all the specified intervals
    pub fn new(intervals: Vec<I>) -> SegmentTree<I> {
        // Elementary segments are half-open, so the boundary after an interval is `until + 1`
        let boundaries: Vec<usize> = intervals
            .iter()
            .flat_map(|interval| [interval.from(), interval.until() + 1])
            .collect::<BTreeSet<usize>>()
            .into_iter()
            .collect();

        if boundaries.len() < 2 {
            return SegmentTree(None);
        }

        let mut tree = SegmentTree(Some(Self::build_empty(&boundaries)));
        for interval in intervals {
            tree.insert(interval);
        }
        tree
    }

    /// Build a new empty segment tree with one leaf between each pair of consecutive boundaries
    fn build_empty(boundaries: &[usize]) -> SegmentNode<I> {
        let start = boundaries[0];
        let end = boundaries[boundaries.len() - 1];
        if boundaries.len() <= 2 {
            return SegmentNode::Leaf {
                start,
                end,
                intervals: vec![],
            };
        }
        let mid = boundaries.len() / 2;
        SegmentNode::Inner {
            start,
            end,
            left_child: Box::new(Self::build_empty(&boundaries[..=mid])),
            right_child: Box::new(Self::build_empty(&boundaries[mid..])),
            intervals: vec![],
        }
    }

    /// Insert a new interval in the tree
    ///
    /// Invariant: the interval endpoints should already be boundaries in the tree!
    fn insert(&mut self, interval: I) {
        let from = interval.from();
        let end = interval.until() + 1;

        let mut to_visit: Vec<&mut SegmentNode<I>> = vec![];
        if let Some(root) = self.0.as_mut() {
            to_visit.push(root);
        }

        while let Some(node) = to_visit.pop() {
            let (node_start, node_end) = node.span();
            if node_end <= from || end <= node_start {
                continue;
            }

            // If the node's segment is in the input interval, add the interval to the node
            if from <= node_start && node_end <= end {
                node.push_interval(interval.clone());
                continue;
            }

            if let SegmentNode::Inner {
                left_child,
                right_child,
                ..
            } = node
            {
                to_visit.push(left_child);
                to_visit.push(right_child);
            }
        }
    }
}

/// Node in the segment tree, covering the half-open segment `[start, end)`
#[derive(Debug)]
enum SegmentNode<I> {
    Leaf {
        start: usize,
        end: usize,

        /// Intervals covering the whole segment
        intervals: Vec<I>,
    },
    Inner {
        start: usize,
        end: usize,
        left_child: Box<SegmentNode<I>>,
        right_child: Box<SegmentNode<I>>,

        /// Intervals covering the whole segment, but not the segment of the parent
        intervals: Vec<I>,
    },
}

impl<I> SegmentNode<I> {
    fn span(&self) -> (usize, usize) {
        match self {
            SegmentNode::Leaf { start, end, .. } | SegmentNode::Inner { start, end, .. } => {
                (*start, *end)
            }
        }
    }

    fn contains(&self, point: usize) -> bool {
        let (start, end) = self.span();
        start <= point && point < end
    }

    fn intervals(&self) -> &[I] {
        match self {
            SegmentNode::Leaf { intervals, .. } | SegmentNode::Inner { intervals, .. } => {
                intervals
            }
        }
    }

    fn push_interval(&mut self, interval: I) {
        match self {
            SegmentNode::Leaf { intervals, .. } | SegmentNode::Inner { intervals, .. } => {
                intervals.push(interval)
            }
        }
    }
}

/// Closed interval of addresses
pub trait Interval {
    /// Start of the interval (inclusive)
    fn from(&self) -> usize;

    /// End of the interval (inclusive)
    fn until(&self) -> usize;
}

impl<I: Interval> Interval for &I {
    fn from(&self) -> usize {
        Interval::from(*self)
    }

    fn until(&self) -> usize {
        Interval::until(*self)
    }
}

impl Interval for RangeInclusive<usize> {
    fn from(&self) -> usize {
        *self.start()
    }

    fn until(&self) -> usize {
        *self.end()
    }
}
