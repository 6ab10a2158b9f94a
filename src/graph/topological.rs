//! Topological propagation over a condensed graph.

use std::collections::VecDeque;

use crate::graph::condensation::Condensation;
use crate::graph::DirectedGraphOps;

/// Callbacks invoked during [`search`].
pub trait TopologicalVisitor {
    /// Called for each component representative in topological order.
    /// Returning `false` stops propagation to its successors; they keep
    /// their remaining in-degree and are not reached through this vertex.
    fn on_visit(&mut self, representative: u32) -> bool;

    /// Called for each component representative right after [`on_visit`]
    /// returned, whatever its result.
    ///
    /// [`on_visit`]: TopologicalVisitor::on_visit
    fn on_finished(&mut self, representative: u32) {
        let _ = representative;
    }
}

/// Visits the component representatives of `condensation` in topological
/// order of the condensed graph, starting from those without incoming
/// edges.
pub fn search(condensation: &Condensation, visitor: &mut impl TopologicalVisitor) {
    let dag = condensation.dag();
    let mut in_degree = vec![0u32; dag.vertex_count() as usize];
    for (_, target) in dag.edges() {
        in_degree[target as usize] += 1;
    }
    let mut queue: VecDeque<u32> = (0..dag.vertex_count())
        .filter(|&v| in_degree[v as usize] == 0 && condensation.is_representative(v))
        .collect();
    while let Some(vertex) = queue.pop_front() {
        if visitor.on_visit(vertex) {
            for &successor in dag.edges_of(vertex) {
                in_degree[successor as usize] -= 1;
                if in_degree[successor as usize] == 0 {
                    queue.push_back(successor);
                }
            }
        }
        visitor.on_finished(vertex);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DirectedGraph;

    struct Recorder {
        order: Vec<u32>,
        stop_at: Option<u32>,
    }

    impl TopologicalVisitor for Recorder {
        fn on_visit(&mut self, representative: u32) -> bool {
            self.order.push(representative);
            self.stop_at != Some(representative)
        }
    }

    fn record(graph: &DirectedGraph, stop_at: Option<u32>) -> Vec<u32> {
        let condensation = Condensation::new(graph);
        let mut recorder = Recorder { order: Vec::new(), stop_at };
        search(&condensation, &mut recorder);
        recorder.order
    }

    #[test]
    fn sources_come_before_their_successors() {
        let graph = DirectedGraph::new(4, [(0, 2), (1, 2), (2, 3)]);
        let order = record(&graph, None);
        let position = |v| order.iter().position(|&it| it == v).unwrap();
        assert!(position(0) < position(2));
        assert!(position(1) < position(2));
        assert!(position(2) < position(3));
    }

    #[test]
    fn a_cycle_is_visited_once_through_its_representative() {
        let graph = DirectedGraph::new(4, [(0, 1), (1, 2), (2, 1), (2, 3)]);
        let order = record(&graph, None);
        assert_eq!(order.len(), 3);
        assert_eq!(order[0], 0);
        assert_eq!(*order.last().unwrap(), 3);
    }

    #[test]
    fn stopping_propagation_starves_downstream_vertices() {
        let graph = DirectedGraph::new(3, [(0, 1), (1, 2)]);
        let order = record(&graph, Some(1));
        assert_eq!(order, vec![0, 1]);
    }
}
