//! Start and end selection for a source's dialog graph
//!
//! Guarantees that every node is reachable from some chosen start and can
//! reach some chosen end, even on graphs that are pure cycles. Natural
//! starts (in-degree 0) and ends (out-degree 0) seed the sets; the
//! expansion loop then grows them until both closures cover the graph.
//!
//! Tie-breaking is asymmetric on purpose: start candidates resolve to the
//! smallest id, end candidates to the largest.

use std::collections::BTreeSet;

use petgraph::Direction;

use crate::graph::{IdGraph, reachable_from, reaching_to};

/// Choose start and end node sets for `graph`. `preferred_starts` (the
/// initial dialogs of the source's talks, in order) take priority whenever
/// a new start is needed.
pub fn find_start_end(
    graph: &IdGraph,
    preferred_starts: &[i64],
) -> (BTreeSet<i64>, BTreeSet<i64>) {
    let node_count = graph.node_count();
    let mut nodes: Vec<i64> = graph.nodes().collect();
    nodes.sort_unstable();

    let mut start_set = BTreeSet::new();
    let mut end_set = BTreeSet::new();
    for &node in &nodes {
        if degree(graph, node, Direction::Incoming) == 0 {
            start_set.insert(node);
        }
        if degree(graph, node, Direction::Outgoing) == 0 {
            end_set.insert(node);
        }
    }

    let mut descendants = BTreeSet::new();
    for &start in &start_set {
        descendants.extend(reachable_from(graph, start));
    }
    let mut ancestors = BTreeSet::new();
    for &end in &end_set {
        ancestors.extend(reaching_to(graph, end));
    }
    let mut preferred: Vec<i64> = preferred_starts
        .iter()
        .copied()
        .filter(|node| graph.contains_node(*node) && !descendants.contains(node))
        .collect();

    while descendants.len() < node_count || ancestors.len() < node_count {
        let mut new_start = None;
        if descendants.len() < node_count {
            let chosen = preferred.first().copied().unwrap_or_else(|| {
                // Loop dialogs usually open on the line with the most
                // options; take the largest out-degree, smallest id.
                nodes
                    .iter()
                    .copied()
                    .filter(|node| !descendants.contains(node))
                    .max_by_key(|&node| {
                        (
                            degree(graph, node, Direction::Outgoing),
                            std::cmp::Reverse(node),
                        )
                    })
                    .expect("some node is not yet covered")
            });
            start_set.insert(chosen);
            descendants.extend(reachable_from(graph, chosen));
            preferred.retain(|node| !descendants.contains(node));
            new_start = Some(chosen);
        }
        if ancestors.len() < node_count {
            match new_start {
                Some(fresh) if !ancestors.contains(&fresh) => {
                    // The fresh start cannot reach any end, so it sits in a
                    // cycle: the nodes feeding it become ends.
                    let mut preds: Vec<i64> = graph
                        .neighbors_directed(fresh, Direction::Incoming)
                        .filter(|pred| !ancestors.contains(pred))
                        .collect();
                    preds.sort_unstable();
                    for pred in preds {
                        end_set.insert(pred);
                        ancestors.extend(reaching_to(graph, pred));
                    }
                }
                _ => {
                    // A node with a large total degree is likely the joint
                    // of several loops; largest id breaks ties.
                    let chosen = nodes
                        .iter()
                        .copied()
                        .filter(|node| !ancestors.contains(node))
                        .max_by_key(|&node| (total_degree(graph, node), node))
                        .expect("some node is not yet covered");
                    end_set.insert(chosen);
                    ancestors.extend(reaching_to(graph, chosen));
                }
            }
        }
    }
    (start_set, end_set)
}

fn degree(graph: &IdGraph, node: i64, dir: Direction) -> usize {
    graph.neighbors_directed(node, dir).count()
}

fn total_degree(graph: &IdGraph, node: i64) -> usize {
    degree(graph, node, Direction::Incoming) + degree(graph, node, Direction::Outgoing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn graph_of(edges: &[(i64, i64)]) -> IdGraph {
        let mut graph = IdGraph::new();
        for &(u, v) in edges {
            graph.add_edge(u, v, ());
        }
        graph
    }

    #[test]
    fn path_uses_natural_endpoints() {
        let graph = graph_of(&[(1, 2), (2, 3)]);
        let (starts, ends) = find_start_end(&graph, &[]);
        assert_eq!(starts, BTreeSet::from([1]));
        assert_eq!(ends, BTreeSet::from([3]));
    }

    #[test]
    fn pure_cycle_forces_a_start_and_its_predecessor_end() {
        let graph = graph_of(&[(30, 31), (31, 32), (32, 30)]);
        let (starts, ends) = find_start_end(&graph, &[]);
        assert_eq!(starts, BTreeSet::from([30]));
        assert_eq!(ends, BTreeSet::from([32]));
    }

    #[test]
    fn preferred_start_wins_over_degree() {
        // Cycle with no natural start; 31 is the talk's initial dialog.
        let graph = graph_of(&[(30, 31), (31, 32), (32, 30)]);
        let (starts, ends) = find_start_end(&graph, &[31]);
        assert_eq!(starts, BTreeSet::from([31]));
        assert_eq!(ends, BTreeSet::from([30]));
    }

    #[test]
    fn tail_cycle_gains_an_end() {
        // 1 -> 2 -> 3 -> 4 -> 2: natural start but no natural end.
        let graph = graph_of(&[(1, 2), (2, 3), (3, 4), (4, 2)]);
        let (starts, ends) = find_start_end(&graph, &[]);
        assert_eq!(starts, BTreeSet::from([1]));
        // Node 2 joins the chain and the cycle, so its total degree wins.
        assert_eq!(ends, BTreeSet::from([2]));
    }

    #[test]
    fn every_node_covered_by_both_closures() {
        // Two cycles sharing node 5.
        let graph = graph_of(&[(1, 2), (2, 5), (5, 1), (5, 6), (6, 7), (7, 5)]);
        let (starts, ends) = find_start_end(&graph, &[]);
        let mut descendants = BTreeSet::new();
        for &start in &starts {
            descendants.extend(reachable_from(&graph, start));
        }
        let mut ancestors = BTreeSet::new();
        for &end in &ends {
            ancestors.extend(reaching_to(&graph, end));
        }
        assert_eq!(descendants.len(), graph.node_count());
        assert_eq!(ancestors.len(), graph.node_count());
    }
}
