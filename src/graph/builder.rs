//! Graph construction module

use crate::config::Chain;
use crate::error::{CommunityError, Result};
use crate::graph::{ChainEdge, CloneNode, RepertoireGraph};
use std::collections::{BTreeMap, HashMap};

/// Similarity scores carried by one chain edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainScores {
    pub weight: f64,
    pub nweight: f64,
    pub cweight: Option<f64>,
    pub ncweight: Option<f64>,
}

impl ChainScores {
    /// Scores where full and core comparisons agree
    pub fn uniform(weight: f64, nweight: f64) -> Self {
        Self {
            weight,
            nweight,
            cweight: Some(weight),
            ncweight: Some(nweight),
        }
    }
}

/// Builder for incrementally constructing a RepertoireGraph from string ids
pub struct RepertoireGraphBuilder {
    /// Mapping from clone ids to node indices
    id_to_index: HashMap<String, usize>,

    /// Clones in insertion order
    nodes: Vec<CloneNode>,

    /// Edges keyed by clone id, resolved at build time
    pending_edges: Vec<(String, String, Chain, ChainScores)>,
}

impl RepertoireGraphBuilder {
    /// Create a new graph builder with the given node capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            id_to_index: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            pending_edges: Vec::new(),
        }
    }

    /// Add a clone, failing on a repeated id
    pub fn add_clone(&mut self, id: &str, sample: &str, clone_size: u64) -> Result<usize> {
        self.add_clone_with_metadata(id, sample, clone_size, BTreeMap::new())
    }

    /// Add a clone together with pass-through metadata
    pub fn add_clone_with_metadata(
        &mut self,
        id: &str,
        sample: &str,
        clone_size: u64,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> Result<usize> {
        if self.id_to_index.contains_key(id) {
            return Err(CommunityError::data(format!("duplicate clone id '{}'", id)));
        }

        let idx = self.nodes.len();
        self.id_to_index.insert(id.to_string(), idx);
        self.nodes.push(CloneNode {
            id: id.to_string(),
            sample: sample.to_string(),
            clone_size,
            metadata,
        });

        Ok(idx)
    }

    /// Add a per-chain similarity edge between two clone ids
    pub fn add_edge(&mut self, from: &str, to: &str, chain: Chain, scores: ChainScores) {
        self.pending_edges
            .push((from.to_string(), to.to_string(), chain, scores));
    }

    /// Look up the index of a clone added earlier
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.id_to_index.get(id).copied()
    }

    /// Resolve edge endpoints and validate the resulting graph
    pub fn build(self) -> Result<RepertoireGraph> {
        let mut edges = Vec::with_capacity(self.pending_edges.len());

        for (from, to, chain, scores) in self.pending_edges {
            let source = *self.id_to_index.get(&from).ok_or_else(|| {
                CommunityError::data(format!("edge references unknown clone '{}'", from))
            })?;
            let target = *self.id_to_index.get(&to).ok_or_else(|| {
                CommunityError::data(format!("edge references unknown clone '{}'", to))
            })?;

            edges.push(ChainEdge {
                source,
                target,
                chain,
                weight: scores.weight,
                nweight: scores.nweight,
                cweight: scores.cweight,
                ncweight: scores.ncweight,
            });
        }

        let graph = RepertoireGraph {
            nodes: self.nodes,
            edges,
        };
        graph.validate()?;

        log::debug!(
            "Built repertoire graph with {} clones and {} chain edges",
            graph.node_count(),
            graph.edge_count()
        );

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_resolves_ids() {
        let mut builder = RepertoireGraphBuilder::with_capacity(2);
        builder.add_clone("a", "x", 3).unwrap();
        builder.add_clone("b", "y", 1).unwrap();
        builder.add_edge("b", "a", Chain::Cdr3a, ChainScores::uniform(20.0, 0.7));

        let graph = builder.build().unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edges[0].source, 1);
        assert_eq!(graph.edges[0].target, 0);
        assert_eq!(graph.edges[0].ncweight, Some(0.7));
    }

    #[test]
    fn test_builder_rejects_unknown_endpoint() {
        let mut builder = RepertoireGraphBuilder::with_capacity(1);
        builder.add_clone("a", "x", 3).unwrap();
        builder.add_edge("a", "missing", Chain::Cdr3a, ChainScores::uniform(1.0, 0.1));
        assert!(matches!(builder.build(), Err(CommunityError::Data(_))));
    }

    #[test]
    fn test_builder_rejects_duplicate_clone() {
        let mut builder = RepertoireGraphBuilder::with_capacity(1);
        builder.add_clone("a", "x", 3).unwrap();
        assert!(builder.add_clone("a", "y", 1).is_err());
    }
}
