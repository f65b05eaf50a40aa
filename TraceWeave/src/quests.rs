//! Quest graph construction and cycle removal
//!
//! Suggested-next lists in the dumps freely form cycles, but downstream
//! phases need a DAG to order sources across quests. Cycle removal has no
//! smart strategy, only a deterministic one: enumerate the simple cycles of
//! each weak component, canonicalize them with the minimum-id node first,
//! and peel one in-edge of the lexicographically first cycle's head until
//! the component is acyclic.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::Direction;
use tracing::{debug, info};

use crate::database::Database;
use crate::graph::{IdGraph, weakly_connected_components};

/// Fill every quest's `next_quests`/`prev_quests` from the suggested-next
/// lists. With `remove_cycles` the surviving relation is a DAG.
pub fn connect_quests(db: &mut Database, remove_cycles: bool) {
    let mut graph = IdGraph::new();
    for (&quest_id, quest) in &db.quests {
        graph.add_node(quest_id);
        for &next in &quest.suggested_next {
            graph.add_edge(quest_id, next, ());
        }
    }

    if remove_cycles {
        info!("connecting quests while removing cycles");
        let mut removed = 0usize;
        for component in weakly_connected_components(&graph) {
            removed += break_component_cycles(&mut graph, &component);
        }
        if removed > 0 {
            info!(edges = removed, "removed quest edges to break cycles");
        }
    } else {
        info!("connecting quests");
    }

    let mut edges: Vec<(i64, i64)> = graph.all_edges().map(|(u, v, _)| (u, v)).collect();
    edges.sort_unstable();
    for (u, v) in edges {
        if let Some(quest) = db.quests.get_mut(&u) {
            quest.next_quests.push(v);
        }
        if let Some(quest) = db.quests.get_mut(&v) {
            quest.prev_quests.push(u);
        }
    }
}

/// Peel edges until `component` contains no directed cycle. Returns the
/// number of removed edges.
fn break_component_cycles(graph: &mut IdGraph, component: &BTreeSet<i64>) -> usize {
    let mut removed = 0;
    loop {
        let mut cycles = simple_cycles(graph, component);
        if cycles.is_empty() {
            return removed;
        }
        cycles.sort();
        let nodes_in_cycles: BTreeSet<i64> = cycles.iter().flatten().copied().collect();
        let victim = cycles[0][0];

        // Prefer severing an edge from outside the cycles; among equals the
        // largest predecessor id goes first.
        let prev = graph
            .neighbors_directed(victim, Direction::Incoming)
            .min_by_key(|&pred| (nodes_in_cycles.contains(&pred), std::cmp::Reverse(pred)))
            .expect("a node on a cycle has an in-neighbor");
        debug!(from = prev, to = victim, "removing quest edge");
        graph.remove_edge(prev, victim);
        removed += 1;
    }
}

/// All simple cycles among `allowed` nodes (Johnson's algorithm). Each cycle
/// is reported exactly once, rotated so its minimum node comes first.
fn simple_cycles(graph: &IdGraph, allowed: &BTreeSet<i64>) -> Vec<Vec<i64>> {
    let nodes: Vec<i64> = allowed.iter().copied().collect();
    let mut cycles = Vec::new();
    for (i, &start) in nodes.iter().enumerate() {
        let scope: BTreeSet<i64> = nodes[i..].iter().copied().collect();
        let mut state = CircuitState {
            blocked: BTreeSet::new(),
            block_map: BTreeMap::new(),
            path: Vec::new(),
        };
        circuit(graph, start, start, &scope, &mut state, &mut cycles);
    }
    cycles
}

struct CircuitState {
    blocked: BTreeSet<i64>,
    block_map: BTreeMap<i64, BTreeSet<i64>>,
    path: Vec<i64>,
}

fn circuit(
    graph: &IdGraph,
    node: i64,
    start: i64,
    scope: &BTreeSet<i64>,
    state: &mut CircuitState,
    cycles: &mut Vec<Vec<i64>>,
) -> bool {
    let mut found = false;
    state.path.push(node);
    state.blocked.insert(node);
    let mut nexts: Vec<i64> = graph
        .neighbors_directed(node, Direction::Outgoing)
        .filter(|next| scope.contains(next))
        .collect();
    nexts.sort_unstable();
    for &next in &nexts {
        if next == start {
            cycles.push(state.path.clone());
            found = true;
        } else if !state.blocked.contains(&next) && circuit(graph, next, start, scope, state, cycles)
        {
            found = true;
        }
    }
    if found {
        unblock(node, state);
    } else {
        for next in nexts {
            state.block_map.entry(next).or_default().insert(node);
        }
    }
    state.path.pop();
    found
}

fn unblock(node: i64, state: &mut CircuitState) {
    state.blocked.remove(&node);
    if let Some(preds) = state.block_map.remove(&node) {
        for pred in preds {
            if state.blocked.contains(&pred) {
                unblock(pred, state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::types::Quest;
    use pretty_assertions::assert_eq;

    fn database_with_quests(edges: &[(i64, &[i64])]) -> Database {
        let mut db = Database::new();
        for &(id, nexts) in edges {
            db.quests.insert(
                id,
                Quest {
                    id,
                    suggested_next: nexts.to_vec(),
                    ..Quest::default()
                },
            );
        }
        db
    }

    #[test]
    fn simple_cycles_rotate_minimum_first() {
        let mut graph = IdGraph::new();
        graph.add_edge(2, 3, ());
        graph.add_edge(3, 2, ());
        graph.add_edge(3, 4, ());
        graph.add_edge(4, 2, ());
        let cycles = simple_cycles(&graph, &BTreeSet::from([2, 3, 4]));
        assert_eq!(cycles, vec![vec![2, 3], vec![2, 3, 4]]);
    }

    #[test]
    fn without_removal_both_directions_survive() {
        let mut db = database_with_quests(&[(1, &[2]), (2, &[1])]);
        connect_quests(&mut db, false);
        assert_eq!(db.quests[&1].next_quests, vec![2]);
        assert_eq!(db.quests[&2].next_quests, vec![1]);
    }

    #[test]
    fn two_cycle_keeps_edge_out_of_smaller_id() {
        let mut db = database_with_quests(&[(1, &[2]), (2, &[1])]);
        connect_quests(&mut db, true);
        assert_eq!(db.quests[&1].next_quests, vec![2]);
        assert_eq!(db.quests[&1].prev_quests, Vec::<i64>::new());
        assert_eq!(db.quests[&2].prev_quests, vec![1]);
        assert_eq!(db.quests[&2].next_quests, Vec::<i64>::new());
    }

    #[test]
    fn result_is_acyclic_and_deterministic() {
        let build = || database_with_quests(&[(1, &[2]), (2, &[3]), (3, &[1, 4]), (4, &[2])]);
        let mut first = build();
        connect_quests(&mut first, true);
        let mut second = build();
        connect_quests(&mut second, true);
        for id in [1, 2, 3, 4] {
            assert_eq!(first.quests[&id].next_quests, second.quests[&id].next_quests);
        }

        // No directed cycle survives.
        let mut graph = IdGraph::new();
        for quest in first.quests.values() {
            graph.add_node(quest.id);
            for &next in &quest.next_quests {
                graph.add_edge(quest.id, next, ());
            }
        }
        assert!(!petgraph::algo::is_cyclic_directed(&graph));
    }

    #[test]
    fn disjoint_chain_is_untouched() {
        let mut db = database_with_quests(&[(1, &[2]), (2, &[3]), (3, &[])]);
        connect_quests(&mut db, true);
        assert_eq!(db.quests[&1].next_quests, vec![2]);
        assert_eq!(db.quests[&2].next_quests, vec![3]);
        assert_eq!(db.quests[&3].prev_quests, vec![2]);
    }
}
