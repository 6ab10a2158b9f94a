//! Strongly connected component condensation.

use crate::graph::{DirectedGraph, DirectedGraphOps};

const UNVISITED: u32 = u32::MAX;

/// The condensation of a directed graph.
///
/// Every vertex is mapped to the representative of its strongly connected
/// component. The condensed graph keeps the original vertex count; edges
/// exist only between representatives, so non-representative vertices are
/// isolated in it.
#[derive(Debug, Clone)]
pub struct Condensation {
    representatives: Vec<u32>,
    dag: DirectedGraph,
}

impl Condensation {
    /// Condenses `graph` with an iterative Tarjan traversal, so recursion
    /// depth does not bound the graph size.
    #[must_use]
    pub fn new<G: DirectedGraphOps + ?Sized>(graph: &G) -> Self {
        let vertex_count = graph.vertex_count() as usize;
        let mut index = vec![UNVISITED; vertex_count];
        let mut low = vec![UNVISITED; vertex_count];
        let mut on_stack = vec![false; vertex_count];
        let mut representatives = vec![UNVISITED; vertex_count];
        let mut scc_stack: Vec<u32> = Vec::new();
        let mut counter = 0u32;
        // (vertex, index of the next successor to explore)
        let mut call_stack: Vec<(u32, usize)> = Vec::new();

        for start in 0..graph.vertex_count() {
            if index[start as usize] != UNVISITED {
                continue;
            }
            call_stack.push((start, 0));
            index[start as usize] = counter;
            low[start as usize] = counter;
            counter += 1;
            on_stack[start as usize] = true;
            scc_stack.push(start);

            while let Some(position) = call_stack.len().checked_sub(1) {
                let (vertex, edge_index) = call_stack[position];
                let successors = graph.edges_of(vertex);
                if let Some(&next) = successors.get(edge_index) {
                    call_stack[position].1 += 1;
                    if index[next as usize] == UNVISITED {
                        index[next as usize] = counter;
                        low[next as usize] = counter;
                        counter += 1;
                        on_stack[next as usize] = true;
                        scc_stack.push(next);
                        call_stack.push((next, 0));
                    } else if on_stack[next as usize] {
                        low[vertex as usize] = low[vertex as usize].min(index[next as usize]);
                    }
                    continue;
                }
                call_stack.pop();
                if low[vertex as usize] == index[vertex as usize] {
                    // vertex is the root of its component
                    while let Some(member) = scc_stack.pop() {
                        on_stack[member as usize] = false;
                        representatives[member as usize] = vertex;
                        if member == vertex {
                            break;
                        }
                    }
                }
                if let Some(&(parent, _)) = call_stack.last() {
                    low[parent as usize] = low[parent as usize].min(low[vertex as usize]);
                }
            }
        }

        let dag = DirectedGraph::new(
            graph.vertex_count(),
            graph.edges().filter_map(|(source, target)| {
                let source_rep = representatives[source as usize];
                let target_rep = representatives[target as usize];
                (source_rep != target_rep).then_some((source_rep, target_rep))
            }),
        );
        Self { representatives, dag }
    }

    /// The representative of the component containing `vertex`.
    #[must_use]
    pub fn representative(&self, vertex: u32) -> u32 {
        self.representatives[vertex as usize]
    }

    /// Returns `true` if `vertex` represents its own component.
    #[must_use]
    pub fn is_representative(&self, vertex: u32) -> bool {
        self.representatives[vertex as usize] == vertex
    }

    /// The condensed component graph. Acyclic by construction.
    #[must_use]
    pub fn dag(&self) -> &DirectedGraph {
        &self.dag
    }

    /// Iterates over the members of the component represented by `vertex`.
    pub fn members_of(&self, representative: u32) -> impl Iterator<Item = u32> + '_ {
        self.representatives
            .iter()
            .enumerate()
            .filter_map(move |(vertex, &rep)| {
                #[expect(clippy::cast_possible_truncation)]
                let vertex = vertex as u32;
                (rep == representative).then_some(vertex)
            })
    }
}

impl DirectedGraphOps for Condensation {
    fn vertex_count(&self) -> u32 {
        self.dag.vertex_count()
    }

    fn edges_of(&self, vertex: u32) -> &[u32] {
        self.dag.edges_of(vertex)
    }

    fn edge_count(&self) -> usize {
        self.dag.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_cycle_collapses_into_one_component() {
        let graph = DirectedGraph::new(4, [(0, 1), (1, 2), (2, 0), (2, 3)]);
        let condensation = Condensation::new(&graph);
        let rep = condensation.representative(0);
        assert_eq!(condensation.representative(1), rep);
        assert_eq!(condensation.representative(2), rep);
        assert_ne!(condensation.representative(3), rep);
        assert_eq!(condensation.dag().edges_of(rep), &[3]);
        assert_eq!(condensation.members_of(rep).count(), 3);
    }

    #[test]
    fn an_acyclic_graph_keeps_singleton_components() {
        let graph = DirectedGraph::new(3, [(0, 1), (1, 2)]);
        let condensation = Condensation::new(&graph);
        for vertex in 0..3 {
            assert!(condensation.is_representative(vertex));
        }
        assert_eq!(condensation.dag().edge_count(), 2);
    }

    #[test]
    fn self_loops_do_not_create_dag_edges() {
        let graph = DirectedGraph::new(2, [(0, 0), (0, 1)]);
        let condensation = Condensation::new(&graph);
        assert_eq!(condensation.dag().edges_of(0), &[1]);
    }

    #[test]
    fn two_interleaved_cycles_form_one_component() {
        let graph = DirectedGraph::new(5, [(0, 1), (1, 2), (2, 0), (1, 3), (3, 1), (3, 4)]);
        let condensation = Condensation::new(&graph);
        let rep = condensation.representative(0);
        for vertex in 0..4 {
            assert_eq!(condensation.representative(vertex), rep);
        }
        assert_ne!(condensation.representative(4), rep);
    }

    #[test]
    fn deep_chains_do_not_overflow_the_stack() {
        let count = 200_000u32;
        let graph = DirectedGraph::new(count, (0..count - 1).map(|v| (v, v + 1)));
        let condensation = Condensation::new(&graph);
        assert!(condensation.is_representative(0));
        assert!(condensation.is_representative(count - 1));
    }
}
