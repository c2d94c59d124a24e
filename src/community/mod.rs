//! Community analysis module

pub mod detection;
pub mod leiden;
pub mod louvain;
pub mod matrix;
pub mod summary;

pub use detection::{partition_graph, partitioner_for, Partitioner};
pub use leiden::Leiden;
pub use louvain::Louvain;
pub use matrix::OccupancyMatrix;
pub use summary::{
    summarize_communities, summarize_nodes, CommunitySampleSummary, CommunitySummaries,
    CommunitySummary, EdgeStats, NodeSummary,
};

use crate::graph::{CloneNode, ConsolidatedGraph};
use petgraph::graph::NodeIndex;
use std::collections::BTreeSet;

/// Consolidated graph with a community label on every node
#[derive(Debug, Clone)]
pub struct PartitionedGraph {
    graph: ConsolidatedGraph,
    communities: Vec<usize>,
    modularity: f64,
}

impl PartitionedGraph {
    /// Pair a graph with one label per node, indexed like the graph's nodes
    pub(crate) fn new(graph: ConsolidatedGraph, communities: Vec<usize>, modularity: f64) -> Self {
        Self {
            graph,
            communities,
            modularity,
        }
    }

    pub fn graph(&self) -> &ConsolidatedGraph {
        &self.graph
    }

    /// Community label of every node
    pub fn communities(&self) -> &[usize] {
        &self.communities
    }

    pub fn community_of(&self, node: NodeIndex) -> usize {
        self.communities[node.index()]
    }

    /// Weighted modularity of the partition at the run's resolution
    pub fn modularity(&self) -> f64 {
        self.modularity
    }

    /// Distinct observed community labels
    pub fn labels(&self) -> BTreeSet<usize> {
        self.communities.iter().copied().collect()
    }

    pub fn community_count(&self) -> usize {
        self.labels().len()
    }

    /// Clones together with their community label
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &CloneNode, usize)> + '_ {
        self.graph
            .node_indices()
            .map(move |idx| (idx, &self.graph[idx], self.communities[idx.index()]))
    }

    /// Node indices of one community
    pub fn members(&self, community: usize) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|idx| self.communities[idx.index()] == community)
            .collect()
    }
}
