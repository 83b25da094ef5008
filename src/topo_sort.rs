//! Dependency-ordered sort over an explicit node/edge graph (Kahn's
//! algorithm).

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

use crate::error::CoreError;

/// A directed acyclic graph of `T` nodes with `insert`/`add_edge` mutation
/// and a [`TopoSort::sort`] that yields nodes with no remaining
/// predecessors first, breaking ties by insertion order for determinism.
#[derive(Debug, Clone, Default)]
pub struct TopoSort<T: Eq + Hash + Clone> {
    nodes: Vec<T>,
    index: HashMap<T, usize>,
    edges: Vec<HashSet<usize>>,
}

impl<T: Eq + Hash + Clone> TopoSort<T> {
    pub fn new() -> Self {
        TopoSort { nodes: Vec::new(), index: HashMap::new(), edges: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn has(&self, t: &T) -> bool {
        self.index.contains_key(t)
    }

    pub fn insert(&mut self, t: T) {
        self.ensure(t);
    }

    /// Records that `before` must precede `after`.
    pub fn add_edge(&mut self, before: T, after: T) {
        let b = self.ensure(before);
        let a = self.ensure(after);
        self.edges[b].insert(a);
    }

    fn ensure(&mut self, t: T) -> usize {
        if let Some(&i) = self.index.get(&t) {
            return i;
        }
        let i = self.nodes.len();
        self.index.insert(t.clone(), i);
        self.nodes.push(t);
        self.edges.push(HashSet::new());
        i
    }

    /// Returns nodes in an order consistent with every recorded edge, or
    /// [`CoreError::InvalidArgument`] if the graph has an empty node set or
    /// a dependency cycle.
    pub fn sort(&self) -> Result<Vec<T>, CoreError> {
        if self.nodes.is_empty() {
            return Err(CoreError::invalid_argument("topological sort over an empty graph"));
        }
        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        for targets in &self.edges {
            for &t in targets {
                indegree[t] += 1;
            }
        }
        let mut ready: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut out = Vec::with_capacity(n);
        while let Some(i) = ready.pop_front() {
            out.push(self.nodes[i].clone());
            for &t in &self.edges[i] {
                indegree[t] -= 1;
                if indegree[t] == 0 {
                    ready.push_back(t);
                }
            }
        }
        if out.len() != n {
            return Err(CoreError::invalid_argument("dependency cycle"));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sorts_a_chain_in_insertion_order() {
        let mut g = TopoSort::new();
        g.insert("a");
        g.add_edge("a", "b");
        g.add_edge("b", "c");
        assert_eq!(g.sort().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn sorts_a_diamond() {
        let mut g = TopoSort::new();
        g.add_edge("a", "b");
        g.add_edge("a", "c");
        g.add_edge("b", "d");
        g.add_edge("c", "d");
        let order = g.sort().unwrap();
        let pos = |x| order.iter().position(|&y| y == x).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn detects_cycles() {
        let mut g = TopoSort::new();
        g.add_edge("a", "b");
        g.add_edge("b", "a");
        assert!(g.sort().is_err());
    }

    #[test]
    fn rejects_empty_graph() {
        let g: TopoSort<&str> = TopoSort::new();
        assert!(g.sort().is_err());
    }
}
