//! The interconnect graph hosts, the device, and switches sit on.
//!
//! The teacher's memory simulator defines a small `Topology` trait
//! (`get_latency(from, to)`) behind whatever model backs it — a flat
//! uniform latency, or a handful of fixed DRAM link hops. Here the model
//! is an arbitrary graph loaded from configuration, so the trait is kept
//! but backed by `petgraph`'s shortest-path search instead of a hardcoded
//! latency table.

use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};

use crate::error::SimError;
use crate::types::NodeId;

pub trait Topology {
    /// Hop cost of the shortest path between two nodes.
    fn cost(&self, from: NodeId, to: NodeId) -> u64;

    /// Sum of `cost` over each consecutive pair in `nodes`.
    fn path_cost(&self, nodes: &[NodeId]) -> u64 {
        nodes.windows(2).map(|pair| self.cost(pair[0], pair[1])).sum()
    }

    /// The candidate closest to `source`; ties keep the first candidate,
    /// matching the order callers supply them in.
    fn closest(&self, source: NodeId, candidates: &[NodeId]) -> NodeId {
        extremum(self, source, candidates, |new, best| new < best)
    }

    /// The candidate furthest from `source`; ties keep the first candidate.
    fn furthest(&self, source: NodeId, candidates: &[NodeId]) -> NodeId {
        extremum(self, source, candidates, |new, best| new > best)
    }
}

fn extremum<T: Topology + ?Sized>(
    topology: &T,
    source: NodeId,
    candidates: &[NodeId],
    better: impl Fn(u64, u64) -> bool,
) -> NodeId {
    let mut best = candidates[0];
    let mut best_cost = topology.cost(source, best);
    for &candidate in &candidates[1..] {
        let candidate_cost = topology.cost(source, candidate);
        if better(candidate_cost, best_cost) {
            best = candidate;
            best_cost = candidate_cost;
        }
    }
    best
}

/// A graph-backed topology over a fixed set of node ids 0..num_nodes,
/// connected by unweighted, bidirectional edges.
pub struct GraphTopology {
    graph: UnGraph<(), ()>,
}

impl GraphTopology {
    pub fn new(num_nodes: usize, edges: &[(NodeId, NodeId)]) -> Result<Self, SimError> {
        let mut graph = UnGraph::new_undirected();
        for _ in 0..num_nodes {
            graph.add_node(());
        }
        for &(a, b) in edges {
            let a = a as usize;
            let b = b as usize;
            if a >= num_nodes {
                return Err(SimError::UnknownNodeId(a as NodeId));
            }
            if b >= num_nodes {
                return Err(SimError::UnknownNodeId(b as NodeId));
            }
            graph.add_edge(NodeIndex::new(a), NodeIndex::new(b), ());
        }
        Ok(GraphTopology { graph })
    }
}

impl Topology for GraphTopology {
    fn cost(&self, from: NodeId, to: NodeId) -> u64 {
        if from == to {
            return 0;
        }
        let distances = dijkstra(&self.graph, NodeIndex::new(from as usize), None, |_| 1u64);
        *distances
            .get(&NodeIndex::new(to as usize))
            .unwrap_or_else(|| panic!("no path between node {from} and node {to}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_of_four() -> GraphTopology {
        // 0 - 1 - 2 - 3
        GraphTopology::new(4, &[(0, 1), (1, 2), (2, 3)]).unwrap()
    }

    #[test]
    fn cost_is_shortest_hop_count() {
        let topo = line_of_four();
        assert_eq!(topo.cost(0, 0), 0);
        assert_eq!(topo.cost(0, 1), 1);
        assert_eq!(topo.cost(0, 3), 3);
    }

    #[test]
    fn path_cost_sums_consecutive_hops() {
        let topo = line_of_four();
        assert_eq!(topo.path_cost(&[0, 1, 2, 3]), 3);
        assert_eq!(topo.path_cost(&[0, 3, 0]), 6);
    }

    #[test]
    fn closest_and_furthest_break_ties_by_first_occurrence() {
        // A star with two arms of equal length: 1 and 2 are both one hop
        // from the center, so ties should resolve to whichever is listed
        // first in the candidate slice.
        let star = GraphTopology::new(3, &[(0, 1), (0, 2)]).unwrap();
        assert_eq!(star.closest(0, &[1, 2]), 1);
        assert_eq!(star.furthest(0, &[1, 2]), 1);
        assert_eq!(star.closest(0, &[2, 1]), 2);
    }
}
