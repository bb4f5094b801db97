/// Forwarding pointers between indices
///
/// Every index starts out as its own representative. Aliasing one index to another makes the
/// representative of the first point at the representative of the second, so chains of aliases
/// always end at one canonical index and can never form a cycle.
#[derive(Clone, Debug, Default)]
pub struct Forwarding {
    parent: Vec<usize>,
}

impl Forwarding {
    pub fn new() -> Forwarding {
        Forwarding { parent: vec![] }
    }

    /// Make sure indices below `len` are tracked
    pub fn grow(&mut self, len: usize) {
        while self.parent.len() < len {
            let next = self.parent.len();
            self.parent.push(next);
        }
    }

    /// Follow forwarding pointers to the canonical index
    pub fn find(&self, index: usize) -> usize {
        let mut current = index;
        while let Some(&parent) = self.parent.get(current) {
            if parent == current {
                break;
            }
            current = parent;
        }
        current
    }

    /// Forward `from` (and everything already forwarded to it) to `to`
    ///
    /// Returns `false` if the two already share a canonical index.
    pub fn alias(&mut self, from: usize, to: usize) -> bool {
        self.grow(from.max(to) + 1);
        let from_root = self.find(from);
        let to_root = self.find(to);
        if from_root == to_root {
            return false;
        }
        self.parent[from_root] = to_root;
        true
    }

    /// Has the index been forwarded somewhere else?
    pub fn is_forwarded(&self, index: usize) -> bool {
        self.find(index) != index
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chains_resolve_to_root() {
        let mut forwarding = Forwarding::new();
        forwarding.grow(5);
        assert!(forwarding.alias(0, 1));
        assert!(forwarding.alias(1, 2));
        assert_eq!(forwarding.find(0), 2);
        assert_eq!(forwarding.find(1), 2);
        assert_eq!(forwarding.find(3), 3);
        assert!(forwarding.is_forwarded(0));
        assert!(!forwarding.is_forwarded(2));
    }

    #[test]
    fn aliasing_never_cycles() {
        let mut forwarding = Forwarding::new();
        forwarding.grow(3);
        assert!(forwarding.alias(0, 1));
        assert!(!forwarding.alias(1, 0));
        assert!(!forwarding.alias(0, 0));
        assert_eq!(forwarding.find(0), 1);
        assert_eq!(forwarding.find(1), 1);
    }

    #[test]
    fn untracked_indices_are_their_own_root() {
        let forwarding = Forwarding::new();
        assert_eq!(forwarding.find(42), 42);
    }
}
