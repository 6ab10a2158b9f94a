//! Iterative depth-first traversal with visitor callbacks.

use crate::graph::DirectedGraphOps;

/// Callbacks invoked during a [`search`]. All methods have empty default
/// implementations so a visitor only implements what it needs.
pub trait DepthFirstVisitor {
    /// Called when the traversal starts a new tree at `root`.
    fn on_start(&mut self, root: u32) {
        let _ = root;
    }

    /// Called the first time `vertex` is reached. Returning `false` prunes
    /// the traversal below it.
    fn on_visit(&mut self, vertex: u32) -> bool {
        let _ = vertex;
        true
    }

    /// Called when an edge leads to an already visited vertex.
    fn on_visit_again(&mut self, vertex: u32) {
        let _ = vertex;
    }

    /// Called when all successors of `vertex` have been explored.
    fn on_leave(&mut self, vertex: u32) {
        let _ = vertex;
    }

    /// Called once at the end with the visited marks of all vertices.
    fn on_finished(&mut self, visited: &[bool]) {
        let _ = visited;
    }
}

/// Runs a depth-first traversal from `roots`, in order, skipping roots
/// already reached from an earlier one. The traversal is iterative, so
/// recursion depth does not bound the graph size.
pub fn search<G: DirectedGraphOps + ?Sized>(
    graph: &G,
    roots: impl IntoIterator<Item = u32>,
    visitor: &mut impl DepthFirstVisitor,
) {
    let mut visited = vec![false; graph.vertex_count() as usize];
    // (vertex, index of the next successor to explore)
    let mut stack: Vec<(u32, usize)> = Vec::new();
    for root in roots {
        if visited[root as usize] {
            continue;
        }
        visitor.on_start(root);
        visited[root as usize] = true;
        if visitor.on_visit(root) {
            stack.push((root, 0));
        } else {
            visitor.on_leave(root);
        }
        while let Some(position) = stack.len().checked_sub(1) {
            let (vertex, edge_index) = stack[position];
            let successors = graph.edges_of(vertex);
            if edge_index >= successors.len() {
                stack.pop();
                visitor.on_leave(vertex);
                continue;
            }
            stack[position].1 += 1;
            let next = successors[edge_index];
            if visited[next as usize] {
                visitor.on_visit_again(next);
            } else {
                visited[next as usize] = true;
                if visitor.on_visit(next) {
                    stack.push((next, 0));
                } else {
                    visitor.on_leave(next);
                }
            }
        }
    }
    visitor.on_finished(&visited);
}
