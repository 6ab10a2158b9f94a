//! A compact directed-graph kernel with the traversals used by the
//! analyses: depth-first search, strongly connected component
//! condensation, and topological propagation over the condensed DAG.
//!
//! Vertices are dense `u32` identifiers in `0..vertex_count()`.

pub mod condensation;
pub mod dfs;
#[cfg(feature = "petgraph")]
#[cfg_attr(docsrs, doc(cfg(feature = "petgraph")))]
pub mod petgraph;
pub mod single_root;
pub mod topological;

pub use condensation::Condensation;
pub use dfs::DepthFirstVisitor;
pub use single_root::SingleRootGraph;
pub use topological::TopologicalVisitor;

/// Read access to a directed graph with dense vertex identifiers.
pub trait DirectedGraphOps {
    /// The number of vertices. Vertex identifiers are `0..vertex_count()`.
    fn vertex_count(&self) -> u32;

    /// The successors of `vertex`, sorted and without duplicates.
    fn edges_of(&self, vertex: u32) -> &[u32];

    /// Iterates over all edges as `(source, target)` pairs.
    fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0..self.vertex_count())
            .flat_map(|source| self.edges_of(source).iter().map(move |&target| (source, target)))
    }

    /// The total number of edges.
    fn edge_count(&self) -> usize {
        (0..self.vertex_count()).map(|v| self.edges_of(v).len()).sum()
    }
}

/// A directed graph in compressed sparse row form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectedGraph {
    offsets: Vec<u32>,
    targets: Vec<u32>,
}

impl DirectedGraph {
    /// Builds a graph from an edge list. Parallel edges are collapsed and
    /// adjacency lists are sorted.
    ///
    /// # Panics
    /// Panics if an edge references a vertex outside `0..vertex_count`.
    #[must_use]
    pub fn new(vertex_count: u32, edges: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let mut adjacency: Vec<Vec<u32>> = vec![Vec::new(); vertex_count as usize];
        for (source, target) in edges {
            assert!(source < vertex_count && target < vertex_count, "edge out of bounds");
            adjacency[source as usize].push(target);
        }
        let mut offsets = Vec::with_capacity(vertex_count as usize + 1);
        let mut targets = Vec::new();
        offsets.push(0);
        for mut successors in adjacency {
            successors.sort_unstable();
            successors.dedup();
            targets.extend_from_slice(&successors);
            #[expect(clippy::cast_possible_truncation)]
            offsets.push(targets.len() as u32);
        }
        Self { offsets, targets }
    }

    /// Builds the graph with every edge reversed.
    #[must_use]
    pub fn reverse(&self) -> Self {
        Self::new(self.vertex_count(), self.edges().map(|(source, target)| (target, source)))
    }

    /// Builds the undirected closure, i.e. each edge paired with its
    /// reversal.
    #[must_use]
    pub fn to_undirected(&self) -> Self {
        Self::new(
            self.vertex_count(),
            self.edges().flat_map(|(source, target)| [(source, target), (target, source)]),
        )
    }
}

impl DirectedGraphOps for DirectedGraph {
    fn vertex_count(&self) -> u32 {
        #[expect(clippy::cast_possible_truncation)]
        let count = (self.offsets.len() - 1) as u32;
        count
    }

    fn edges_of(&self, vertex: u32) -> &[u32] {
        let start = self.offsets[vertex as usize] as usize;
        let end = self.offsets[vertex as usize + 1] as usize;
        &self.targets[start..end]
    }

    fn edge_count(&self) -> usize {
        self.targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacency_is_sorted_and_deduplicated() {
        let graph = DirectedGraph::new(4, [(0, 2), (0, 1), (0, 2), (3, 0)]);
        assert_eq!(graph.edges_of(0), &[1, 2]);
        assert_eq!(graph.edges_of(1), &[] as &[u32]);
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn reversal_flips_every_edge() {
        let graph = DirectedGraph::new(3, [(0, 1), (1, 2)]);
        let reversed = graph.reverse();
        assert_eq!(reversed.edges_of(1), &[0]);
        assert_eq!(reversed.edges_of(2), &[1]);
        assert_eq!(reversed.edges_of(0), &[] as &[u32]);
    }

    #[test]
    fn undirected_closure_contains_both_directions() {
        let graph = DirectedGraph::new(3, [(0, 1)]);
        let undirected = graph.to_undirected();
        assert_eq!(undirected.edges_of(0), &[1]);
        assert_eq!(undirected.edges_of(1), &[0]);
    }
}
