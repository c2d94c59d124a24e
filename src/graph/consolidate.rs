//! Merging of per-chain parallel edges into one weighted edge per clone pair

use crate::config::{Chain, CommunityConfig, Metric};
use crate::graph::{CloneNode, RepertoireGraph};
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-chain scalar weights of one clone pair, keyed by chain.
///
/// A chain can be present without a usable score: its edge exists but the
/// selected field is null, NaN or infinite. Such a chain still counts as
/// carried by the pair and makes the combined weight undefined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainWeights {
    weights: [Option<f64>; 6],
    #[serde(default)]
    undefined: [bool; 6],
}

impl ChainWeights {
    /// Defined score of a chain
    pub fn get(&self, chain: Chain) -> Option<f64> {
        self.weights[chain.index()]
    }

    /// Record a chain's score; a repeated chain keeps the larger score
    pub fn insert(&mut self, chain: Chain, weight: f64) {
        let slot = &mut self.weights[chain.index()];
        *slot = Some(match *slot {
            Some(existing) => existing.max(weight),
            None => weight,
        });
    }

    /// Record a chain whose selected score is missing or not finite
    pub fn insert_undefined(&mut self, chain: Chain) {
        self.undefined[chain.index()] = true;
    }

    pub fn is_undefined(&self, chain: Chain) -> bool {
        self.undefined[chain.index()]
    }

    /// True when the chain has an edge on this pair, defined or not
    pub fn contains(&self, chain: Chain) -> bool {
        self.get(chain).is_some() || self.is_undefined(chain)
    }

    /// Chains with a defined weight, in enumeration order
    pub fn iter(&self) -> impl Iterator<Item = (Chain, f64)> + '_ {
        Chain::ALL
            .into_iter()
            .filter_map(move |chain| self.get(chain).map(|w| (chain, w)))
    }

    /// Chains carried by the edge
    pub fn chains(&self) -> Vec<Chain> {
        Chain::ALL
            .into_iter()
            .filter(|&chain| self.contains(chain))
            .collect()
    }

    pub fn len(&self) -> usize {
        Chain::ALL.iter().filter(|&&chain| self.contains(chain)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reduce the per-chain weights to one scalar.
    ///
    /// `paired` is true when two chains were requested; only then does a
    /// one-sided edge count as missing a chain. Any present chain without a
    /// defined score makes the result undefined.
    pub fn combine(&self, metric: Metric, paired: bool) -> Option<f64> {
        if self.undefined.iter().any(|&u| u) {
            return None;
        }
        let values: Vec<f64> = self.iter().map(|(_, w)| w).collect();
        if values.is_empty() {
            return None;
        }
        // With a single requested chain no partner can be missing, so strict
        // and loose reduce to the single score rather than capping at 0
        let one_sided = paired && values.len() < 2;

        let combined = match metric {
            Metric::Average => values.iter().sum::<f64>() / values.len() as f64,
            Metric::Strict => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                if one_sided {
                    min.min(0.0)
                } else {
                    min
                }
            }
            Metric::Loose => {
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if one_sided {
                    max.max(0.0)
                } else {
                    max
                }
            }
        };

        Some(combined)
    }
}

/// One edge per clone pair after consolidation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedEdge {
    /// Component weights of the allowed chains present on the pair
    pub weights: ChainWeights,

    /// Scalar produced by the combination policy; finite and > 0
    pub combined_weight: f64,
}

/// Clone graph with one positively weighted edge per node pair.
///
/// Node indices match the positions of clones in the source `RepertoireGraph`.
pub type ConsolidatedGraph = UnGraph<CloneNode, ConsolidatedEdge>;

/// Select, filter, merge, combine and prune chain edges.
///
/// Expects a configuration already checked by `CommunityConfig::validate`.
pub fn consolidate_edges(graph: &RepertoireGraph, config: &CommunityConfig) -> ConsolidatedGraph {
    log::info!(
        "Consolidating {} chain edges (weight={}, metric={}, chains={:?})",
        graph.edge_count(),
        config.weight,
        config.metric,
        config.chains
    );

    if config.metric == Metric::Strict && !config.is_paired() {
        log::warn!(
            "Strict metric with single chain {:?}: scores are kept as is, no zero cap",
            config.chains
        );
    }

    // Group allowed parallel edges by unordered node pair
    let mut pairs: BTreeMap<(usize, usize), ChainWeights> = BTreeMap::new();
    let mut undefined = 0usize;

    for edge in &graph.edges {
        if !config.chains.contains(&edge.chain) {
            continue;
        }

        let key = if edge.source < edge.target {
            (edge.source, edge.target)
        } else {
            (edge.target, edge.source)
        };
        let entry = pairs.entry(key).or_default();

        match edge.score(config.weight) {
            Some(score) => entry.insert(edge.chain, score),
            None => {
                entry.insert_undefined(edge.chain);
                undefined += 1;
            }
        }
    }

    let mut consolidated =
        ConsolidatedGraph::with_capacity(graph.node_count(), pairs.len());
    for node in &graph.nodes {
        consolidated.add_node(node.clone());
    }

    let paired = config.is_paired();
    let mut dropped = 0usize;

    for ((i, j), weights) in pairs {
        match weights.combine(config.metric, paired) {
            Some(w) if w.is_finite() && w > 0.0 => {
                consolidated.add_edge(
                    NodeIndex::new(i),
                    NodeIndex::new(j),
                    ConsolidatedEdge {
                        weights,
                        combined_weight: w,
                    },
                );
            }
            _ => dropped += 1,
        }
    }

    if undefined > 0 {
        log::debug!("Found {} chain edges with undefined {}", undefined, config.weight);
    }
    log::info!(
        "Kept {} consolidated edges, dropped {} non-positive or undefined pairs",
        consolidated.edge_count(),
        dropped
    );

    consolidated
}
