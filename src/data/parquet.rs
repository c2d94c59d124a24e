//! Parquet file handling for graph data

use crate::config::Chain;
use crate::error::CommunityError;
use crate::graph::builder::ChainScores;
use crate::graph::{RepertoireGraph, RepertoireGraphBuilder};
use anyhow::Result;
use polars::prelude::*;
use std::collections::BTreeMap;

const NODE_COLUMNS: [&str; 3] = ["id", "sample", "clone_size"];
const EDGE_COLUMNS: [&str; 5] = ["from", "to", "chain", "weight", "nweight"];

/// Load clones and chain edges from a pair of Parquet tables.
///
/// Node columns beyond `id`, `sample` and `clone_size` become string metadata.
pub fn load_graph_parquet(nodes_path: &str, edges_path: &str) -> Result<RepertoireGraph> {
    for path in [nodes_path, edges_path] {
        if !std::path::Path::new(path).exists() {
            return Err(anyhow::anyhow!("File not found: {}", path));
        }
    }

    log::info!("Reading parquet files: {} and {}", nodes_path, edges_path);

    let nodes = LazyFrame::scan_parquet(nodes_path, Default::default())?.collect()?;
    let edges = LazyFrame::scan_parquet(edges_path, Default::default())?.collect()?;

    log::info!("Node schema: {:?}", nodes.schema());
    log::info!("Edge schema: {:?}", edges.schema());

    require_columns(&nodes, &NODE_COLUMNS, nodes_path)?;
    require_columns(&edges, &EDGE_COLUMNS, edges_path)?;

    let mut builder = RepertoireGraphBuilder::with_capacity(nodes.height());
    add_clones(&mut builder, &nodes)?;
    add_edges(&mut builder, &edges)?;

    let graph = builder.build()?;
    log::info!(
        "Loaded {} clones and {} chain edges",
        graph.node_count(),
        graph.edge_count()
    );

    Ok(graph)
}

fn require_columns(df: &DataFrame, required: &[&str], path: &str) -> Result<()> {
    let present: Vec<String> = df.get_column_names().iter().map(|c| c.to_string()).collect();
    for column in required {
        if !present.iter().any(|p| p == column) {
            return Err(
                CommunityError::data(format!("{} lacks required column '{}'", path, column)).into(),
            );
        }
    }
    Ok(())
}

fn string_column(df: &DataFrame, name: &str) -> Result<Series> {
    Ok(df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)?)
}

fn float_column(df: &DataFrame, name: &str) -> Result<Series> {
    Ok(df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?)
}

fn add_clones(builder: &mut RepertoireGraphBuilder, nodes: &DataFrame) -> Result<()> {
    let ids = string_column(nodes, "id")?;
    let ids = ids.str()?;
    let samples = string_column(nodes, "sample")?;
    let samples = samples.str()?;
    let sizes = nodes
        .column("clone_size")?
        .as_materialized_series()
        .cast(&DataType::UInt64)?;
    let sizes = sizes.u64()?;

    // Remaining columns are passed through as strings
    let mut extra = Vec::new();
    for name in nodes.get_column_names() {
        let name = name.to_string();
        if !NODE_COLUMNS.contains(&name.as_str()) {
            let series = string_column(nodes, &name)?;
            extra.push((name, series));
        }
    }

    for i in 0..nodes.height() {
        let id = ids
            .get(i)
            .ok_or_else(|| CommunityError::data(format!("row {} has no clone id", i)))?;
        let sample = samples
            .get(i)
            .ok_or_else(|| CommunityError::data(format!("clone '{}' has no sample", id)))?;
        let clone_size = sizes
            .get(i)
            .ok_or_else(|| CommunityError::data(format!("clone '{}' has no clone_size", id)))?;

        let mut metadata = BTreeMap::new();
        for (name, series) in &extra {
            let value = match series.str()?.get(i) {
                Some(v) => serde_json::Value::String(v.to_string()),
                None => serde_json::Value::Null,
            };
            metadata.insert(name.clone(), value);
        }

        builder.add_clone_with_metadata(id, sample, clone_size, metadata)?;
    }

    Ok(())
}

fn add_edges(builder: &mut RepertoireGraphBuilder, edges: &DataFrame) -> Result<()> {
    let from = string_column(edges, "from")?;
    let from = from.str()?;
    let to = string_column(edges, "to")?;
    let to = to.str()?;
    let chains = string_column(edges, "chain")?;
    let chains = chains.str()?;
    let weight = float_column(edges, "weight")?;
    let weight = weight.f64()?;
    let nweight = float_column(edges, "nweight")?;
    let nweight = nweight.f64()?;

    // Core scores are optional; absent columns mean no core comparison
    let has_column = |name: &str| edges.get_column_names().iter().any(|c| c.as_str() == name);
    let cweight = if has_column("cweight") {
        Some(float_column(edges, "cweight")?)
    } else {
        None
    };
    let ncweight = if has_column("ncweight") {
        Some(float_column(edges, "ncweight")?)
    } else {
        None
    };
    let cweight = cweight.as_ref().map(|s| s.f64()).transpose()?;
    let ncweight = ncweight.as_ref().map(|s| s.f64()).transpose()?;

    for i in 0..edges.height() {
        let (Some(src), Some(dst)) = (from.get(i), to.get(i)) else {
            return Err(CommunityError::data(format!("edge row {} lacks an endpoint", i)).into());
        };
        let raw = chains
            .get(i)
            .ok_or_else(|| CommunityError::data(format!("edge row {} has no chain", i)))?;
        let chain = raw.parse::<Chain>().map_err(|_| {
            CommunityError::data(format!("edge row {} has unknown chain '{}'", i, raw))
        })?;

        // Missing normalized or raw scores count as undefined
        let scores = ChainScores {
            weight: weight.get(i).unwrap_or(f64::NAN),
            nweight: nweight.get(i).unwrap_or(f64::NAN),
            cweight: cweight.and_then(|c| c.get(i)),
            ncweight: ncweight.and_then(|c| c.get(i)),
        };

        builder.add_edge(src, dst, chain, scores);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::path::Path;

    fn write_parquet(path: &Path, df: &mut DataFrame) {
        let file = File::create(path).unwrap();
        ParquetWriter::new(file).finish(df).unwrap();
    }

    fn write_tables(dir: &Path, chains: [&str; 2]) -> (String, String) {
        let nodes_path = dir.join("nodes.parquet");
        let edges_path = dir.join("edges.parquet");

        let mut nodes = df!(
            "id" => ["A", "B", "C"],
            "sample" => ["x", "x", "y"],
            "clone_size" => [3u64, 5, 2],
            "v_gene" => ["TRBV5", "TRBV5", "TRBV7"]
        )
        .unwrap();
        let mut edges = df!(
            "from" => ["A", "B"],
            "to" => ["B", "C"],
            "chain" => chains,
            "weight" => [40.0, 4.0],
            "nweight" => [0.9, 0.1],
            "ncweight" => [Some(0.85), None]
        )
        .unwrap();

        write_parquet(&nodes_path, &mut nodes);
        write_parquet(&edges_path, &mut edges);
        (
            nodes_path.to_str().unwrap().to_string(),
            edges_path.to_str().unwrap().to_string(),
        )
    }

    #[test]
    fn test_load_nodes_and_edges() {
        let dir = tempfile::tempdir().unwrap();
        let (nodes, edges) = write_tables(dir.path(), ["CDR3a", "CDR3b"]);

        let graph = load_graph_parquet(&nodes, &edges).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.nodes[1].clone_size, 5);
        assert_eq!(
            graph.nodes[2].metadata.get("v_gene"),
            Some(&serde_json::Value::String("TRBV7".to_string()))
        );
        assert_eq!(graph.edges[0].chain, Chain::Cdr3a);
        assert_eq!(graph.edges[0].ncweight, Some(0.85));
        assert_eq!(graph.edges[1].ncweight, None);
        assert_eq!(graph.edges[1].cweight, None);
    }

    #[test]
    fn test_unknown_chain_is_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let (nodes, edges) = write_tables(dir.path(), ["CDR3a", "CDR3z"]);

        let err = load_graph_parquet(&nodes, &edges).unwrap_err();
        match err.downcast_ref::<CommunityError>() {
            Some(CommunityError::Data(message)) => assert!(message.contains("CDR3z")),
            other => panic!("expected a data error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_column_is_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let (nodes, _) = write_tables(dir.path(), ["CDR3a", "CDR3b"]);

        let edges_path = dir.path().join("no_chain.parquet");
        let mut edges = df!(
            "from" => ["A"],
            "to" => ["B"],
            "weight" => [40.0],
            "nweight" => [0.9]
        )
        .unwrap();
        write_parquet(&edges_path, &mut edges);

        let err = load_graph_parquet(&nodes, edges_path.to_str().unwrap()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CommunityError>(),
            Some(CommunityError::Data(_))
        ));
    }
}
