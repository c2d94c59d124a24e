//! Clone similarity graph representation

pub mod builder;
pub mod consolidate;

pub use builder::RepertoireGraphBuilder;
pub use consolidate::{consolidate_edges, ChainWeights, ConsolidatedEdge, ConsolidatedGraph};

use crate::config::{Chain, WeightField};
use crate::error::{CommunityError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A clone: cells sharing one receptor sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloneNode {
    /// Stable clone identifier
    pub id: String,

    /// Repertoire the clone was sampled from
    pub sample: String,

    /// Number of cells carrying the clone
    pub clone_size: u64,

    /// Opaque pass-through attributes
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl CloneNode {
    pub fn new(id: impl Into<String>, sample: impl Into<String>, clone_size: u64) -> Self {
        Self {
            id: id.into(),
            sample: sample.into(),
            clone_size,
            metadata: BTreeMap::new(),
        }
    }
}

/// One per-chain similarity edge between two clones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEdge {
    /// Index of the first clone
    pub source: usize,

    /// Index of the second clone
    pub target: usize,

    pub chain: Chain,

    /// Raw alignment score
    pub weight: f64,

    /// Length-normalized alignment score
    pub nweight: f64,

    /// Raw score over the CDR3 core; absent when no core comparison exists
    pub cweight: Option<f64>,

    /// Length-normalized core score; absent when no core comparison exists
    pub ncweight: Option<f64>,
}

impl ChainEdge {
    /// Score for the selected field, `None` when undefined
    pub fn score(&self, field: WeightField) -> Option<f64> {
        let value = match field {
            WeightField::Nweight => Some(self.nweight),
            WeightField::Ncweight => self.ncweight,
        };
        value.filter(|v| v.is_finite())
    }
}

/// Undirected multigraph of clones with one edge per compared chain.
///
/// Produced by the pairwise scorer and graph builder; the pipeline only reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepertoireGraph {
    pub nodes: Vec<CloneNode>,
    pub edges: Vec<ChainEdge>,
}

impl RepertoireGraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Distinct repertoire labels in sorted order
    pub fn samples(&self) -> Vec<String> {
        let mut samples: Vec<String> = self.nodes.iter().map(|n| n.sample.clone()).collect();
        samples.sort_unstable();
        samples.dedup();
        samples
    }

    /// Check that the graph is non-empty and structurally well-formed
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(CommunityError::data("graph has no nodes"));
        }

        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if node.id.is_empty() {
                return Err(CommunityError::data("clone with empty id"));
            }
            if !seen.insert(node.id.as_str()) {
                return Err(CommunityError::data(format!("duplicate clone id '{}'", node.id)));
            }
            if node.sample.is_empty() {
                return Err(CommunityError::data(format!(
                    "clone '{}' has no sample",
                    node.id
                )));
            }
            if node.clone_size == 0 {
                return Err(CommunityError::data(format!(
                    "clone '{}' has clone_size 0",
                    node.id
                )));
            }
        }

        let n = self.nodes.len();
        for (i, edge) in self.edges.iter().enumerate() {
            if edge.source >= n || edge.target >= n {
                return Err(CommunityError::data(format!(
                    "edge {} references a clone outside the graph",
                    i
                )));
            }
            if edge.source == edge.target {
                return Err(CommunityError::data(format!(
                    "edge {} connects clone '{}' to itself",
                    i, self.nodes[edge.source].id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: usize, target: usize) -> ChainEdge {
        ChainEdge {
            source,
            target,
            chain: Chain::Cdr3b,
            weight: 10.0,
            nweight: 0.5,
            cweight: None,
            ncweight: Some(f64::NAN),
        }
    }

    #[test]
    fn test_empty_graph_is_data_error() {
        let graph = RepertoireGraph::default();
        assert!(matches!(graph.validate(), Err(CommunityError::Data(_))));
    }

    #[test]
    fn test_self_loop_rejected() {
        let graph = RepertoireGraph {
            nodes: vec![CloneNode::new("a", "x", 1)],
            edges: vec![edge(0, 0)],
        };
        assert!(matches!(graph.validate(), Err(CommunityError::Data(_))));
    }

    #[test]
    fn test_zero_clone_size_rejected() {
        let graph = RepertoireGraph {
            nodes: vec![CloneNode::new("a", "x", 0)],
            edges: vec![],
        };
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_undefined_scores() {
        let e = edge(0, 1);
        assert_eq!(e.score(WeightField::Nweight), Some(0.5));
        assert_eq!(e.score(WeightField::Ncweight), None);
    }

    #[test]
    fn test_samples_sorted_and_distinct() {
        let graph = RepertoireGraph {
            nodes: vec![
                CloneNode::new("a", "y", 1),
                CloneNode::new("b", "x", 1),
                CloneNode::new("c", "y", 1),
            ],
            edges: vec![],
        };
        assert_eq!(graph.samples(), vec!["x".to_string(), "y".to_string()]);
    }
}
