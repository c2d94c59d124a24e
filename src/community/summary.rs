//! Per-community and per-clone summary statistics

use crate::community::PartitionedGraph;
use crate::config::Chain;
use crate::graph::ConsolidatedEdge;
use petgraph::visit::EdgeRef;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, HashMap};

/// Similarity statistics over the edges internal to one community
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeStats {
    /// Number of internal edges
    pub edges: usize,

    /// Mean combined weight
    pub w: f64,

    /// Mean component weight per allowed chain, counting absent chains as 0
    pub chain_weights: BTreeMap<Chain, f64>,

    /// Internal edges carrying each allowed chain
    pub chain_edges: BTreeMap<Chain, usize>,
}

impl EdgeStats {
    /// Statistics of a community without internal edges
    pub fn zero(chains: &[Chain]) -> Self {
        Self {
            edges: 0,
            w: 0.0,
            chain_weights: chains.iter().map(|&c| (c, 0.0)).collect(),
            chain_edges: chains.iter().map(|&c| (c, 0)).collect(),
        }
    }

    /// Aggregate the internal edges of one community
    pub fn from_edges(edges: &[ConsolidatedEdge], chains: &[Chain]) -> Self {
        if edges.is_empty() {
            return Self::zero(chains);
        }

        let w = edges.iter().map(|e| e.combined_weight).mean();

        let mut chain_weights = BTreeMap::new();
        let mut chain_edges = BTreeMap::new();
        for &chain in chains {
            // Denominator is every internal edge, not only those carrying the chain
            let mean = edges
                .iter()
                .map(|e| e.weights.get(chain).unwrap_or(0.0))
                .mean();
            let present = edges.iter().filter(|e| e.weights.contains(chain)).count();

            chain_weights.insert(chain, mean);
            chain_edges.insert(chain, present);
        }

        Self {
            edges: edges.len(),
            w,
            chain_weights,
            chain_edges,
        }
    }
}

/// One row per community
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunitySummary {
    pub community: usize,

    /// Distinct clones across all repertoires
    pub clones: usize,

    /// Cells across all repertoires
    pub cells: u64,

    /// Clones per repertoire, zero-filled
    pub sample_clones: BTreeMap<String, usize>,

    /// Cells per repertoire, zero-filled
    pub sample_cells: BTreeMap<String, u64>,

    pub edge_stats: EdgeStats,
}

/// One row per community and repertoire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunitySampleSummary {
    pub community: usize,
    pub sample: String,
    pub clones: usize,
    pub cells: u64,
    pub edge_stats: EdgeStats,
}

/// Wide and tall layouts of the same community statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunitySummaries {
    pub wide: Vec<CommunitySummary>,
    pub tall: Vec<CommunitySampleSummary>,
}

/// One row per clone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: String,
    pub sample: String,
    pub clone_size: u64,
    pub community: usize,

    /// Clones in the same community
    pub community_size: usize,

    /// Consolidated edges incident to the clone
    pub degree: usize,

    /// Sum of incident combined weights
    pub strength: f64,

    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Default)]
struct VertexStats {
    clones: usize,
    cells: u64,
    per_sample: BTreeMap<String, (usize, u64)>,
}

/// Compute vertex and edge statistics for every observed community
pub fn summarize_communities(
    partitioned: &PartitionedGraph,
    chains: &[Chain],
) -> CommunitySummaries {
    let graph = partitioned.graph();

    let mut samples: Vec<String> = partitioned
        .nodes()
        .map(|(_, node, _)| node.sample.clone())
        .collect();
    samples.sort_unstable();
    samples.dedup();

    // Vertex statistics
    let mut vertex: BTreeMap<usize, VertexStats> = BTreeMap::new();
    for (_, node, community) in partitioned.nodes() {
        let stats = vertex.entry(community).or_default();
        stats.clones += 1;
        stats.cells += node.clone_size;
        let (clones, cells) = stats.per_sample.entry(node.sample.clone()).or_default();
        *clones += 1;
        *cells += node.clone_size;
    }

    // Internal edges grouped by community
    let mut internal: HashMap<usize, Vec<ConsolidatedEdge>> = HashMap::new();
    for edge in graph.edge_references() {
        let cs = partitioned.community_of(edge.source());
        let ct = partitioned.community_of(edge.target());
        if cs == ct {
            internal.entry(cs).or_default().push(*edge.weight());
        }
    }

    let labels: Vec<usize> = vertex.keys().copied().collect();
    let edge_stats: Vec<EdgeStats> = labels
        .par_iter()
        .map(|community| match internal.get(community) {
            Some(edges) => EdgeStats::from_edges(edges, chains),
            None => EdgeStats::zero(chains),
        })
        .collect();

    let mut wide = Vec::with_capacity(labels.len());
    let mut tall = Vec::with_capacity(labels.len() * samples.len());

    for ((community, stats), edge_stats) in vertex.into_iter().zip(edge_stats) {
        let mut sample_clones = BTreeMap::new();
        let mut sample_cells = BTreeMap::new();

        for sample in &samples {
            let (clones, cells) = stats.per_sample.get(sample).copied().unwrap_or((0, 0));
            sample_clones.insert(sample.clone(), clones);
            sample_cells.insert(sample.clone(), cells);
            tall.push(CommunitySampleSummary {
                community,
                sample: sample.clone(),
                clones,
                cells,
                edge_stats: edge_stats.clone(),
            });
        }

        wide.push(CommunitySummary {
            community,
            clones: stats.clones,
            cells: stats.cells,
            sample_clones,
            sample_cells,
            edge_stats,
        });
    }

    log::info!(
        "Summarized {} communities over {} repertoires",
        wide.len(),
        samples.len()
    );

    CommunitySummaries { wide, tall }
}

/// Per-clone table with community label and weighted degree
pub fn summarize_nodes(partitioned: &PartitionedGraph) -> Vec<NodeSummary> {
    let graph = partitioned.graph();

    let mut sizes: HashMap<usize, usize> = HashMap::new();
    for &community in partitioned.communities() {
        *sizes.entry(community).or_insert(0) += 1;
    }

    partitioned
        .nodes()
        .map(|(idx, node, community)| {
            let (degree, strength) = graph
                .edges(idx)
                .fold((0, 0.0), |(d, s), e| (d + 1, s + e.weight().combined_weight));

            NodeSummary {
                id: node.id.clone(),
                sample: node.sample.clone(),
                clone_size: node.clone_size,
                community,
                community_size: sizes.get(&community).copied().unwrap_or(0),
                degree,
                strength,
                metadata: node.metadata.clone(),
            }
        })
        .collect()
}
