//! A view that adds a synthetic root above a graph.

use crate::graph::condensation::Condensation;
use crate::graph::DirectedGraphOps;

/// A graph extended with one synthetic root vertex whose successors are
/// chosen at construction. The root id is the base graph's vertex count,
/// so the base vertices keep their identifiers.
#[derive(Debug)]
pub struct SingleRootGraph<'g, G: DirectedGraphOps + ?Sized> {
    base: &'g G,
    root_edges: Vec<u32>,
}

impl<'g, G: DirectedGraphOps + ?Sized> SingleRootGraph<'g, G> {
    /// Attaches a root with edges to `root_edges`.
    #[must_use]
    pub fn new(base: &'g G, mut root_edges: Vec<u32>) -> Self {
        root_edges.sort_unstable();
        root_edges.dedup();
        Self { base, root_edges }
    }

    /// The identifier of the synthetic root.
    #[must_use]
    pub fn root(&self) -> u32 {
        self.base.vertex_count()
    }
}

impl<'g> SingleRootGraph<'g, Condensation> {
    /// Attaches a root above every component of `condensation` that has no
    /// incoming edges, making the whole graph reachable from the root.
    #[must_use]
    pub fn over_condensation(condensation: &'g Condensation) -> Self {
        let dag = condensation.dag();
        let mut has_incoming = vec![false; dag.vertex_count() as usize];
        for (_, target) in dag.edges() {
            has_incoming[target as usize] = true;
        }
        let roots = (0..dag.vertex_count())
            .filter(|&v| condensation.is_representative(v) && !has_incoming[v as usize])
            .collect();
        SingleRootGraph { base: condensation, root_edges: roots }
    }
}

impl<G: DirectedGraphOps + ?Sized> DirectedGraphOps for SingleRootGraph<'_, G> {
    fn vertex_count(&self) -> u32 {
        self.base.vertex_count() + 1
    }

    fn edges_of(&self, vertex: u32) -> &[u32] {
        if vertex == self.root() {
            &self.root_edges
        } else {
            self.base.edges_of(vertex)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::dfs::{self, DepthFirstVisitor};
    use crate::graph::DirectedGraph;

    #[test]
    fn the_root_sits_above_the_base_vertices() {
        let graph = DirectedGraph::new(3, [(0, 1)]);
        let rooted = SingleRootGraph::new(&graph, vec![2, 0, 2]);
        assert_eq!(rooted.root(), 3);
        assert_eq!(rooted.vertex_count(), 4);
        assert_eq!(rooted.edges_of(3), &[0, 2]);
        assert_eq!(rooted.edges_of(0), &[1]);
    }

    #[test]
    fn rooting_a_condensation_reaches_every_vertex() {
        struct Count(u32);
        impl DepthFirstVisitor for Count {
            fn on_visit(&mut self, _vertex: u32) -> bool {
                self.0 += 1;
                true
            }
        }

        let graph = DirectedGraph::new(5, [(0, 1), (2, 3), (3, 2)]);
        let condensation = Condensation::new(&graph);
        let rooted = SingleRootGraph::over_condensation(&condensation);
        let mut count = Count(0);
        dfs::search(&rooted, [rooted.root()], &mut count);
        // the root plus every representative reachable from it
        assert!(count.0 >= 4);
    }
}
