//! Minimum-cost flow over a residual edge arena
//!
//! Successive shortest paths with an SPFA relaxation: the residual network
//! carries negative reverse costs, so plain Dijkstra does not apply and the
//! instances (one per source dialog graph) are small enough not to need
//! potentials. Edges are stored as interleaved forward/backward pairs in an
//! arena; `edge ^ 1` is the companion.

use std::collections::VecDeque;

/// Effectively-unbounded capacity for uncapacitated arcs.
pub const UNBOUNDED: i64 = i64::MAX / 4;

#[derive(Debug, Clone)]
struct Arc {
    to: usize,
    cap: i64,
    cost: i64,
}

#[derive(Debug, Default)]
pub struct MinCostFlow {
    adjacency: Vec<Vec<usize>>,
    arcs: Vec<Arc>,
}

impl MinCostFlow {
    pub fn new(nodes: usize) -> Self {
        MinCostFlow {
            adjacency: vec![Vec::new(); nodes],
            arcs: Vec::new(),
        }
    }

    /// Add a directed arc and its residual companion. Returns the arc's
    /// handle for later flow queries.
    pub fn add_arc(&mut self, from: usize, to: usize, cap: i64, cost: i64) -> usize {
        let handle = self.arcs.len();
        self.adjacency[from].push(handle);
        self.arcs.push(Arc { to, cap, cost });
        self.adjacency[to].push(handle + 1);
        self.arcs.push(Arc {
            to: from,
            cap: 0,
            cost: -cost,
        });
        handle
    }

    /// Flow pushed through a forward arc, i.e. the residual capacity of its
    /// companion.
    pub fn flow(&self, handle: usize) -> i64 {
        self.arcs[handle + 1].cap
    }

    /// Push as much flow as possible from `source` to `sink` at minimum
    /// cost. Returns `(total_flow, total_cost)`.
    pub fn run(&mut self, source: usize, sink: usize) -> (i64, i64) {
        let nodes = self.adjacency.len();
        let mut total_flow = 0;
        let mut total_cost = 0;
        loop {
            // SPFA shortest-path on the residual network.
            let mut dist = vec![i64::MAX; nodes];
            let mut prev_arc = vec![usize::MAX; nodes];
            let mut queued = vec![false; nodes];
            let mut queue = VecDeque::new();
            dist[source] = 0;
            queued[source] = true;
            queue.push_back(source);
            while let Some(node) = queue.pop_front() {
                queued[node] = false;
                let base = dist[node];
                for &handle in &self.adjacency[node] {
                    let arc = &self.arcs[handle];
                    if arc.cap == 0 {
                        continue;
                    }
                    let candidate = base + arc.cost;
                    if candidate < dist[arc.to] {
                        dist[arc.to] = candidate;
                        prev_arc[arc.to] = handle;
                        if !queued[arc.to] {
                            queued[arc.to] = true;
                            queue.push_back(arc.to);
                        }
                    }
                }
            }
            if dist[sink] == i64::MAX {
                return (total_flow, total_cost);
            }

            // Bottleneck along the found path, then augment.
            let mut bottleneck = i64::MAX;
            let mut node = sink;
            while node != source {
                let handle = prev_arc[node];
                bottleneck = bottleneck.min(self.arcs[handle].cap);
                node = self.arcs[handle ^ 1].to;
            }
            let mut node = sink;
            while node != source {
                let handle = prev_arc[node];
                self.arcs[handle].cap -= bottleneck;
                self.arcs[handle ^ 1].cap += bottleneck;
                node = self.arcs[handle ^ 1].to;
            }
            total_flow += bottleneck;
            total_cost += bottleneck * dist[sink];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_path_saturates() {
        let mut flow = MinCostFlow::new(3);
        let first = flow.add_arc(0, 1, 5, 1);
        let second = flow.add_arc(1, 2, 3, 2);
        let (total, cost) = flow.run(0, 2);
        assert_eq!(total, 3);
        assert_eq!(cost, 9);
        assert_eq!(flow.flow(first), 3);
        assert_eq!(flow.flow(second), 3);
    }

    #[test]
    fn cheap_path_preferred() {
        // Two disjoint paths from a one-unit gate: 0->1->3 (cost 2) and
        // 0->2->3 (cost 10); the single unit must take the cheap one.
        let mut flow = MinCostFlow::new(5);
        let gate = flow.add_arc(4, 0, 1, 0);
        flow.add_arc(0, 1, 1, 1);
        let cheap = flow.add_arc(1, 3, 1, 1);
        flow.add_arc(0, 2, 1, 5);
        let pricey = flow.add_arc(2, 3, 1, 5);
        let (total, cost) = flow.run(4, 3);
        assert_eq!(total, 1);
        assert_eq!(cost, 2);
        assert_eq!(flow.flow(gate), 1);
        assert_eq!(flow.flow(cheap), 1);
        assert_eq!(flow.flow(pricey), 0);
    }

    #[test]
    fn rerouting_through_residual_arcs() {
        // Classic example where the second augmentation must push flow back
        // over the first path's reverse arc.
        let mut flow = MinCostFlow::new(4);
        flow.add_arc(0, 1, 1, 1);
        flow.add_arc(0, 2, 1, 4);
        flow.add_arc(1, 2, 1, 1);
        flow.add_arc(1, 3, 1, 5);
        flow.add_arc(2, 3, 2, 1);
        let (total, cost) = flow.run(0, 3);
        assert_eq!(total, 2);
        // 0->1->2->3 (3) + 0->2->3 (5).
        assert_eq!(cost, 8);
    }
}
