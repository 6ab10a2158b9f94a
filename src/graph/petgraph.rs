//! Petgraph implementation of the [`DirectedGraph`].

use std::collections::HashSet;
use std::iter::Copied;
use std::slice;

use petgraph::visit::{Control, DfsEvent, GraphBase, IntoNeighbors, Visitable, depth_first_search};

use crate::graph::{DirectedGraph, DirectedGraphOps};

impl GraphBase for DirectedGraph {
    type NodeId = u32;
    type EdgeId = (u32, u32);
}

impl<'a> IntoNeighbors for &'a DirectedGraph {
    type Neighbors = Copied<slice::Iter<'a, u32>>;

    fn neighbors(self, node: u32) -> Self::Neighbors {
        self.edges_of(node).iter().copied()
    }
}

/// A visit map for the directed graph.
pub type Visited = HashSet<u32>;

impl Visitable for DirectedGraph {
    type Map = Visited;

    fn visit_map(&self) -> Self::Map {
        Visited::default()
    }

    fn reset_map(&self, map: &mut Self::Map) {
        map.clear();
    }
}

impl DirectedGraph {
    /// Returns the vertices reachable from `roots`, the roots included.
    #[must_use]
    pub fn reachable_from(&self, roots: impl IntoIterator<Item = u32>) -> HashSet<u32> {
        let roots: Vec<u32> = roots.into_iter().collect();
        let mut reachable: HashSet<u32> = roots.iter().copied().collect();
        depth_first_search(self, roots, |event| {
            if let DfsEvent::TreeEdge(_, target) = event {
                reachable.insert(target);
            }
            Control::<()>::Continue
        });
        reachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reachability_follows_edge_direction() {
        let graph = DirectedGraph::new(5, [(0, 1), (1, 2), (3, 4)]);
        let reachable = graph.reachable_from([0]);
        assert_eq!(reachable, HashSet::from([0, 1, 2]));
    }
}
