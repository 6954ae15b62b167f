//! Union-find over parameter occurrences.
//!
//! The layout builder registers one node per parameter occurrence, unions
//! occurrences that must share a value (time-invariant measurement
//! equations) and then freezes the structure into [`EquivalenceClasses`],
//! which is never mutated afterwards.

/// Disjoint-set forest with path compression and union by size.
#[derive(Debug, Clone, Default)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a singleton node and return its id.
    pub fn add(&mut self) -> usize {
        let id = self.parent.len();
        self.parent.push(id);
        self.size.push(1);
        id
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        let (big, small) = if self.size[ra] >= self.size[rb] { (ra, rb) } else { (rb, ra) };
        self.parent[small] = big;
        self.size[big] += self.size[small];
    }

    /// Freeze into immutable classes. Class ids are assigned in order of
    /// the smallest member node, so they are deterministic.
    pub fn into_classes(mut self) -> EquivalenceClasses {
        let n = self.len();
        let mut root_to_class = vec![usize::MAX; n];
        let mut class_of = Vec::with_capacity(n);
        let mut n_classes = 0;
        for node in 0..n {
            let root = self.find(node);
            if root_to_class[root] == usize::MAX {
                root_to_class[root] = n_classes;
                n_classes += 1;
            }
            class_of.push(root_to_class[root]);
        }
        EquivalenceClasses { class_of, n_classes }
    }
}

/// Frozen partition of nodes into classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquivalenceClasses {
    class_of: Vec<usize>,
    n_classes: usize,
}

impl EquivalenceClasses {
    pub fn class_of(&self, node: usize) -> usize {
        self.class_of[node]
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Members of every class, each in ascending node order.
    pub fn members(&self) -> Vec<Vec<usize>> {
        let mut out = vec![Vec::new(); self.n_classes];
        for (node, &class) in self.class_of.iter().enumerate() {
            out[class].push(node);
        }
        out
    }
}
