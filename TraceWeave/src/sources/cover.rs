//! Trace covering: fewest walks that visit every node
//!
//! Reduction to minimum-cost flow on a split-vertex auxiliary graph. Each
//! node `v` splits into an entry and an exit copy joined by a unit-cost
//! arc; a node demand pair (entry consumes one unit, exit supplies one)
//! forces every node to be visited. Original edges become free arcs from
//! exit to entry copies, a super start feeds the chosen starts, the chosen
//! ends drain into a super end, and the end→start return arc costs `|V|`
//! per unit, so the optimizer pays for a new walk only when coverage
//! demands it. The return arc's flow is exactly the number of walks.
//!
//! Reference: <https://cs.stackexchange.com/questions/107397>

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::graph::{IdGraph, shortest_path_to_any};

use super::flow::{MinCostFlow, UNBOUNDED};

/// A successor in the residual walk table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Succ {
    /// The entry copy of a node, by dense index.
    Entry(usize),
    /// The super end.
    End,
}

/// Compute a minimum set of start→end walks covering every node of `graph`.
pub fn find_covering_traces(
    graph: &IdGraph,
    start_set: &BTreeSet<i64>,
    end_set: &BTreeSet<i64>,
) -> Vec<Vec<i64>> {
    let mut ids: Vec<i64> = graph.nodes().collect();
    ids.sort_unstable();
    let node_count = ids.len();
    if node_count == 0 {
        return Vec::new();
    }
    let index: BTreeMap<i64, usize> = ids
        .iter()
        .enumerate()
        .map(|(position, &id)| (id, position))
        .collect();

    // Auxiliary node layout: entry/exit pairs, then the walk endpoints,
    // then the demand transshipment nodes.
    let entry = |i: usize| 2 * i;
    let exit = |i: usize| 2 * i + 1;
    let super_start = 2 * node_count;
    let super_end = 2 * node_count + 1;
    let supply = 2 * node_count + 2;
    let drain = 2 * node_count + 3;

    let mut flow = MinCostFlow::new(2 * node_count + 4);
    let mut split_arcs = Vec::with_capacity(node_count);
    for i in 0..node_count {
        split_arcs.push(flow.add_arc(entry(i), exit(i), UNBOUNDED, 1));
        flow.add_arc(supply, exit(i), 1, 0);
        flow.add_arc(entry(i), drain, 1, 0);
    }
    let mut edges: Vec<(i64, i64)> = graph.all_edges().map(|(u, v, _)| (u, v)).collect();
    edges.sort_unstable();
    let mut edge_arcs = Vec::with_capacity(edges.len());
    for &(u, v) in &edges {
        let arc = flow.add_arc(exit(index[&u]), entry(index[&v]), UNBOUNDED, 0);
        edge_arcs.push(((index[&u], index[&v]), arc));
    }
    let mut start_arcs = Vec::with_capacity(start_set.len());
    for &start in start_set {
        start_arcs.push((index[&start], flow.add_arc(super_start, entry(index[&start]), UNBOUNDED, 0)));
    }
    let mut end_arcs = Vec::with_capacity(end_set.len());
    for &end in end_set {
        end_arcs.push((index[&end], flow.add_arc(exit(index[&end]), super_end, UNBOUNDED, 0)));
    }
    let return_arc = flow.add_arc(super_end, super_start, UNBOUNDED, node_count as i64);

    let (pushed, cost) = flow.run(supply, drain);
    if pushed < node_count as i64 {
        warn!(
            pushed,
            nodes = node_count,
            "cover flow infeasible; some nodes will stay unvisited"
        );
    }
    debug!(cost, walks = flow.flow(return_arc), "cover flow solved");

    // Residual walk table, mirroring the flow on every non-transshipment
    // arc. Split flows may go negative during extraction: the demand pair
    // routes one visit per node around the split arc.
    let mut start_succ: Vec<(usize, i64)> = start_arcs
        .iter()
        .map(|&(node, arc)| (node, flow.flow(arc)))
        .collect();
    let mut exit_succ: Vec<Vec<(Succ, i64)>> = vec![Vec::new(); node_count];
    for &((u, v), arc) in &edge_arcs {
        exit_succ[u].push((Succ::Entry(v), flow.flow(arc)));
    }
    for &(node, arc) in &end_arcs {
        exit_succ[node].push((Succ::End, flow.flow(arc)));
    }
    let mut split_flow: Vec<i64> = split_arcs.iter().map(|&arc| flow.flow(arc)).collect();
    let walk_count = flow.flow(return_arc);

    // Walk extraction: follow the highest remaining flow; ties prefer a
    // concrete node (largest id) over the super end.
    let mut traces: Vec<Vec<i64>> = Vec::new();
    for _ in 0..walk_count {
        let Some(first) = start_succ
            .iter()
            .enumerate()
            .max_by_key(|&(_, &(node, flow_left))| (flow_left, ids[node]))
            .map(|(position, _)| position)
        else {
            break;
        };
        start_succ[first].1 -= 1;
        let mut current = start_succ[first].0;
        let mut trace = Vec::new();
        loop {
            trace.push(ids[current]);
            split_flow[current] -= 1;
            let Some(best) = best_successor(&exit_succ[current], &ids) else {
                break;
            };
            let (succ, _) = exit_succ[current][best];
            exit_succ[current][best].1 -= 1;
            match succ {
                Succ::End => break,
                Succ::Entry(next) => current = next,
            }
        }
        traces.push(trace);
    }

    // Loop folding: flow left on internal cycles was never reached from
    // the super start. Peel each cycle off and work it into the traces.
    let mut loops: Vec<Vec<i64>> = Vec::new();
    for origin in 0..node_count {
        loop {
            let Some(best) = best_successor(&exit_succ[origin], &ids) else {
                break;
            };
            if exit_succ[origin][best].1 <= 0 {
                break;
            }
            let mut cycle = vec![ids[origin]];
            split_flow[origin] -= 1;
            let mut current = origin;
            let mut chosen = best;
            loop {
                let (succ, _) = exit_succ[current][chosen];
                exit_succ[current][chosen].1 -= 1;
                let Succ::Entry(next) = succ else {
                    // Residual flow toward the super end is spent by the
                    // walk extraction; a cycle cannot reach it.
                    debug_assert!(false, "cycle walk reached the super end");
                    break;
                };
                if next == origin {
                    break;
                }
                cycle.push(ids[next]);
                split_flow[next] -= 1;
                current = next;
                chosen = match best_successor(&exit_succ[current], &ids) {
                    Some(position) => position,
                    None => break,
                };
            }
            loops.push(cycle);
        }
    }

    fold_loops(graph, start_set, end_set, &mut traces, loops);
    traces
}

/// Highest-flow successor; `None` only when the list is empty.
fn best_successor(successors: &[(Succ, i64)], ids: &[i64]) -> Option<usize> {
    successors
        .iter()
        .enumerate()
        .max_by_key(|&(_, &(succ, flow_left))| match succ {
            Succ::Entry(node) => (flow_left, 1, ids[node]),
            Succ::End => (flow_left, 0, 0),
        })
        .map(|(position, _)| position)
}

/// Splice each peeled cycle into a trace that shares a node with it, or
/// synthesize a fresh start→cycle→end trace when none does.
fn fold_loops(
    graph: &IdGraph,
    start_set: &BTreeSet<i64>,
    end_set: &BTreeSet<i64>,
    traces: &mut Vec<Vec<i64>>,
    loops: Vec<Vec<i64>>,
) {
    let mut node_to_trace: BTreeMap<i64, usize> = BTreeMap::new();
    for (position, trace) in traces.iter().enumerate() {
        for &id in trace {
            node_to_trace.insert(id, position);
        }
    }
    for cycle in loops {
        let cycle_set: BTreeSet<i64> = cycle.iter().copied().collect();
        if let Some(&trace_position) = cycle
            .iter()
            .find_map(|id| node_to_trace.get(id))
        {
            let trace = &traces[trace_position];
            let entrance_position = trace
                .iter()
                .position(|id| cycle_set.contains(id))
                .expect("trace shares a node with the cycle");
            let rotation = cycle
                .iter()
                .position(|&id| id == trace[entrance_position])
                .expect("entrance lies on the cycle");
            let mut merged =
                Vec::with_capacity(trace.len() + cycle.len());
            merged.extend_from_slice(&trace[..entrance_position]);
            merged.extend_from_slice(&cycle[rotation..]);
            merged.extend_from_slice(&cycle[..rotation]);
            merged.extend_from_slice(&trace[entrance_position..]);
            traces[trace_position] = merged;
            for &id in &cycle {
                node_to_trace.insert(id, trace_position);
            }
        } else {
            let Some(lead_in) = shortest_path_to_any(graph, start_set, &cycle_set) else {
                warn!("no path from any start into a residual cycle");
                continue;
            };
            let entrance = *lead_in.last().expect("path is non-empty");
            let rotation = cycle
                .iter()
                .position(|&id| id == entrance)
                .expect("entrance lies on the cycle");
            let exit_position = (rotation + cycle.len() - 1) % cycle.len();
            let Some(lead_out) = shortest_path_to_any(
                graph,
                &BTreeSet::from([cycle[exit_position]]),
                end_set,
            ) else {
                warn!("no path from a residual cycle to any end");
                continue;
            };
            let mut trace = lead_in;
            trace.extend_from_slice(&cycle[rotation + 1..]);
            trace.extend_from_slice(&cycle[..rotation]);
            trace.extend_from_slice(&lead_out[1..]);
            let position = traces.len();
            for &id in &trace {
                node_to_trace.insert(id, position);
            }
            traces.push(trace);
        }
    }
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

    fn covered(traces: &[Vec<i64>]) -> BTreeSet<i64> {
        traces.iter().flatten().copied().collect()
    }

    #[test]
    fn simple_path_yields_one_trace() {
        let graph = graph_of(&[(1, 2), (2, 3), (3, 4)]);
        let traces = find_covering_traces(
            &graph,
            &BTreeSet::from([1]),
            &BTreeSet::from([4]),
        );
        assert_eq!(traces, vec![vec![1, 2, 3, 4]]);
    }

    #[test]
    fn pure_cycle_yields_one_trace_visiting_all() {
        let graph = graph_of(&[(30, 31), (31, 32), (32, 30)]);
        let traces = find_covering_traces(
            &graph,
            &BTreeSet::from([30]),
            &BTreeSet::from([32]),
        );
        assert_eq!(traces, vec![vec![30, 31, 32]]);
    }

    #[test]
    fn disjoint_chains_need_one_trace_each() {
        // Three chains into a common sink: minimum cover is three walks.
        let graph = graph_of(&[(1, 10), (2, 10), (3, 10), (10, 11)]);
        let traces = find_covering_traces(
            &graph,
            &BTreeSet::from([1, 2, 3]),
            &BTreeSet::from([11]),
        );
        assert_eq!(traces.len(), 3);
        assert_eq!(covered(&traces), BTreeSet::from([1, 2, 3, 10, 11]));
        for trace in &traces {
            assert_eq!(trace.last(), Some(&11));
        }
    }

    #[test]
    fn branching_fan_covers_both_arms() {
        let graph = graph_of(&[(1, 2), (1, 3), (2, 4), (3, 4)]);
        let traces = find_covering_traces(
            &graph,
            &BTreeSet::from([1]),
            &BTreeSet::from([4]),
        );
        assert_eq!(traces.len(), 2);
        assert_eq!(covered(&traces), BTreeSet::from([1, 2, 3, 4]));
    }

    #[test]
    fn side_cycle_is_folded_into_the_walk() {
        // 1 -> 2 -> 3 with a detour 2 -> 5 -> 6 -> 2.
        let graph = graph_of(&[(1, 2), (2, 3), (2, 5), (5, 6), (6, 2)]);
        let traces = find_covering_traces(
            &graph,
            &BTreeSet::from([1]),
            &BTreeSet::from([3]),
        );
        assert_eq!(covered(&traces), BTreeSet::from([1, 2, 3, 5, 6]));
        for trace in &traces {
            assert_eq!(trace.first(), Some(&1));
            assert_eq!(trace.last(), Some(&3));
            for pair in trace.windows(2) {
                assert!(
                    graph.contains_edge(pair[0], pair[1]),
                    "trace takes a real edge {pair:?}"
                );
            }
        }
    }

    #[test]
    fn empty_graph_yields_no_traces() {
        let graph = IdGraph::new();
        let traces =
            find_covering_traces(&graph, &BTreeSet::new(), &BTreeSet::new());
        assert!(traces.is_empty());
    }

    #[test]
    fn covering_is_deterministic() {
        let edges = [(1, 2), (2, 3), (3, 1), (2, 4), (4, 5), (5, 2), (3, 6)];
        let build = || {
            find_covering_traces(
                &graph_of(&edges),
                &BTreeSet::from([1]),
                &BTreeSet::from([6]),
            )
        };
        assert_eq!(build(), build());
    }
}
