//! JSON graph documents

use crate::config::Chain;
use crate::error::CommunityError;
use crate::graph::builder::ChainScores;
use crate::graph::{RepertoireGraph, RepertoireGraphBuilder};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct GraphDocument {
    nodes: Vec<NodeRecord>,
    #[serde(default)]
    edges: Vec<EdgeRecord>,
}

#[derive(Debug, Deserialize)]
struct NodeRecord {
    id: String,
    sample: String,
    clone_size: u64,
    /// Any other field is carried through untouched
    #[serde(flatten)]
    metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct EdgeRecord {
    from: String,
    to: String,
    chain: Chain,
    weight: f64,
    nweight: f64,
    #[serde(default)]
    cweight: Option<f64>,
    #[serde(default)]
    ncweight: Option<f64>,
}

/// Load a graph document `{ "nodes": [...], "edges": [...] }` from a file
pub fn load_graph_json(path: &str) -> Result<RepertoireGraph> {
    log::info!("Reading graph document: {}", path);

    if !std::path::Path::new(path).exists() {
        return Err(anyhow::anyhow!("File not found: {}", path));
    }

    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    parse_graph_json(&text)
}

/// Parse a graph document held in memory
pub fn parse_graph_json(text: &str) -> Result<RepertoireGraph> {
    let document: GraphDocument = serde_json::from_str(text)
        .map_err(|e| CommunityError::data(format!("malformed graph document: {}", e)))?;

    let mut builder = RepertoireGraphBuilder::with_capacity(document.nodes.len());
    for node in document.nodes {
        builder.add_clone_with_metadata(&node.id, &node.sample, node.clone_size, node.metadata)?;
    }
    for edge in document.edges {
        builder.add_edge(
            &edge.from,
            &edge.to,
            edge.chain,
            ChainScores {
                weight: edge.weight,
                nweight: edge.nweight,
                cweight: edge.cweight,
                ncweight: edge.ncweight,
            },
        );
    }

    let graph = builder.build()?;
    log::info!(
        "Loaded {} clones and {} chain edges",
        graph.node_count(),
        graph.edge_count()
    );

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document_with_metadata() {
        let text = r#"{
            "nodes": [
                {"id": "A", "sample": "x", "clone_size": 3, "v_gene": "TRBV5-1"},
                {"id": "B", "sample": "y", "clone_size": 1}
            ],
            "edges": [
                {"from": "A", "to": "B", "chain": "CDR3b", "weight": 40.0,
                 "nweight": 0.8, "cweight": 31.0, "ncweight": null}
            ]
        }"#;

        let graph = parse_graph_json(text).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.nodes[0].metadata["v_gene"], "TRBV5-1");
        assert!(graph.nodes[1].metadata.is_empty());
        assert_eq!(graph.edges[0].chain, Chain::Cdr3b);
        assert_eq!(graph.edges[0].ncweight, None);
        assert_eq!(graph.edges[0].cweight, Some(31.0));
    }

    #[test]
    fn test_missing_required_attribute_is_data_error() {
        let text = r#"{"nodes": [{"id": "A", "clone_size": 3}]}"#;
        let err = parse_graph_json(text).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CommunityError>(),
            Some(CommunityError::Data(_))
        ));
    }

    #[test]
    fn test_unknown_chain_rejected() {
        let text = r#"{
            "nodes": [{"id": "A", "sample": "x", "clone_size": 1},
                      {"id": "B", "sample": "x", "clone_size": 1}],
            "edges": [{"from": "A", "to": "B", "chain": "CDR3z", "weight": 1, "nweight": 0.1}]
        }"#;
        assert!(parse_graph_json(text).is_err());
    }
}
