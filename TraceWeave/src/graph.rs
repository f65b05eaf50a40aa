//! Deterministic digraph helpers shared by the core phases
//!
//! All graphs in the pipeline are keyed by entity id (`i64`), so
//! [`petgraph::graphmap::DiGraphMap`] is used directly. Every helper here
//! iterates nodes and neighbors in sorted id order: the covering and
//! connecting phases break ties on ids, and identical inputs must produce
//! identical outputs.

use std::collections::BTreeSet;
use std::collections::VecDeque;

use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use petgraph::unionfind::UnionFind;

/// Directed graph over entity ids.
pub type IdGraph = DiGraphMap<i64, ()>;

/// Weakly connected components, each sorted ascending, ordered by their
/// smallest member.
pub fn weakly_connected_components(graph: &IdGraph) -> Vec<BTreeSet<i64>> {
    let mut nodes: Vec<i64> = graph.nodes().collect();
    nodes.sort_unstable();
    let index_of = |id: i64| nodes.binary_search(&id).expect("node in graph");

    let mut uf = UnionFind::<usize>::new(nodes.len());
    for (u, v, _) in graph.all_edges() {
        uf.union(index_of(u), index_of(v));
    }

    let mut components: Vec<BTreeSet<i64>> = Vec::new();
    let mut rep_to_component: std::collections::BTreeMap<usize, usize> =
        std::collections::BTreeMap::new();
    for (i, &id) in nodes.iter().enumerate() {
        let rep = uf.find(i);
        let slot = *rep_to_component.entry(rep).or_insert_with(|| {
            components.push(BTreeSet::new());
            components.len() - 1
        });
        components[slot].insert(id);
    }
    components.sort_by_key(|c| *c.iter().next().expect("non-empty component"));
    components
}

/// All nodes reachable from `start` following edge direction, including
/// `start` itself.
pub fn reachable_from(graph: &IdGraph, start: i64) -> BTreeSet<i64> {
    reach(graph, start, Direction::Outgoing)
}

/// All nodes that can reach `target`, including `target` itself.
pub fn reaching_to(graph: &IdGraph, target: i64) -> BTreeSet<i64> {
    reach(graph, target, Direction::Incoming)
}

fn reach(graph: &IdGraph, origin: i64, dir: Direction) -> BTreeSet<i64> {
    let mut seen = BTreeSet::new();
    if !graph.contains_node(origin) {
        return seen;
    }
    // Iterative: game data routinely produces chains longer than any safe
    // recursion depth.
    let mut stack = vec![origin];
    seen.insert(origin);
    while let Some(node) = stack.pop() {
        for next in graph.neighbors_directed(node, dir) {
            if seen.insert(next) {
                stack.push(next);
            }
        }
    }
    seen
}

/// Shortest path (by hop count) from any of `sources` to any node in
/// `targets`, including both endpoints. Neighbors expand in ascending id
/// order so equal-length paths resolve identically across runs.
pub fn shortest_path_to_any(
    graph: &IdGraph,
    sources: &BTreeSet<i64>,
    targets: &BTreeSet<i64>,
) -> Option<Vec<i64>> {
    let mut prev: std::collections::BTreeMap<i64, i64> = std::collections::BTreeMap::new();
    let mut queue = VecDeque::new();
    for &s in sources {
        if !graph.contains_node(s) {
            continue;
        }
        if targets.contains(&s) {
            return Some(vec![s]);
        }
        prev.insert(s, s);
        queue.push_back(s);
    }
    while let Some(node) = queue.pop_front() {
        let mut nexts: Vec<i64> = graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect();
        nexts.sort_unstable();
        for next in nexts {
            if prev.contains_key(&next) {
                continue;
            }
            prev.insert(next, node);
            if targets.contains(&next) {
                let mut path = vec![next];
                let mut cur = next;
                while prev[&cur] != cur {
                    cur = prev[&cur];
                    path.push(cur);
                }
                path.reverse();
                return Some(path);
            }
            queue.push_back(next);
        }
    }
    None
}
