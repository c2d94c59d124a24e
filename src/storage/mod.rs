//! Results persistence module

use crate::community::EdgeStats;
use crate::config::Chain;
use crate::detect::CommunityResult;
use anyhow::Result;
use itertools::Itertools;
use petgraph::visit::EdgeRef;
use serde_json::{json, to_string_pretty};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Save a detection result to the specified directory
pub fn save_results(result: &CommunityResult, output_dir: &str) -> Result<()> {
    log::info!(
        "Saving {} communities to {}",
        result.community_summary.wide.len(),
        output_dir
    );

    // Ensure output directory exists
    fs::create_dir_all(output_dir)?;
    let dir = Path::new(output_dir);

    save_occupancy_matrix(result, dir)?;
    save_wide_summary(result, dir)?;
    save_tall_summary(result, dir)?;
    save_node_summary(result, dir)?;
    save_edges(result, dir)?;
    save_summary(result, dir)?;

    log::info!("Results saved successfully");

    Ok(())
}

/// Quote a CSV field when it contains separators or quotes
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn edge_stat_header(chains: &[Chain]) -> String {
    let mut columns = vec!["w".to_string()];
    columns.extend(chains.iter().map(|c| format!("w_{}", c)));
    columns.extend(chains.iter().map(|c| format!("n_{}", c)));
    columns.join(",")
}

fn edge_stat_values(stats: &EdgeStats, chains: &[Chain]) -> String {
    let mut values = vec![format!("{:.6}", stats.w)];
    values.extend(
        chains
            .iter()
            .map(|c| format!("{:.6}", stats.chain_weights.get(c).copied().unwrap_or(0.0))),
    );
    values.extend(
        chains
            .iter()
            .map(|c| stats.chain_edges.get(c).copied().unwrap_or(0).to_string()),
    );
    values.join(",")
}

/// Communities x repertoires cell counts
fn save_occupancy_matrix(result: &CommunityResult, dir: &Path) -> Result<()> {
    let matrix = &result.community_occupancy_matrix;
    let mut file = BufWriter::new(File::create(dir.join("community_occupancy_matrix.csv"))?);

    writeln!(
        file,
        "community,{}",
        matrix.samples.iter().map(|s| csv_field(s)).join(",")
    )?;
    for (row, community) in matrix.communities.iter().enumerate() {
        writeln!(
            file,
            "{},{}",
            community,
            matrix.counts.row(row).iter().join(",")
        )?;
    }

    Ok(())
}

/// One row per community
fn save_wide_summary(result: &CommunityResult, dir: &Path) -> Result<()> {
    let chains = &result.input_config.chains;
    let samples = &result.community_occupancy_matrix.samples;
    let mut file = BufWriter::new(File::create(dir.join("community_summary_wide.csv"))?);

    let sample_columns = samples
        .iter()
        .flat_map(|s| [format!("clones_{}", s), format!("cells_{}", s)])
        .map(|c| csv_field(&c))
        .join(",");
    writeln!(
        file,
        "community,clones,cells,{},{}",
        sample_columns,
        edge_stat_header(chains)
    )?;

    for row in &result.community_summary.wide {
        let sample_values = samples
            .iter()
            .flat_map(|s| {
                [
                    row.sample_clones.get(s).copied().unwrap_or(0).to_string(),
                    row.sample_cells.get(s).copied().unwrap_or(0).to_string(),
                ]
            })
            .join(",");
        writeln!(
            file,
            "{},{},{},{},{}",
            row.community,
            row.clones,
            row.cells,
            sample_values,
            edge_stat_values(&row.edge_stats, chains)
        )?;
    }

    Ok(())
}

/// One row per community and repertoire
fn save_tall_summary(result: &CommunityResult, dir: &Path) -> Result<()> {
    let chains = &result.input_config.chains;
    let mut file = BufWriter::new(File::create(dir.join("community_summary_tall.csv"))?);

    writeln!(file, "community,sample,clones,cells,{}", edge_stat_header(chains))?;
    for row in &result.community_summary.tall {
        writeln!(
            file,
            "{},{},{},{},{}",
            row.community,
            csv_field(&row.sample),
            row.clones,
            row.cells,
            edge_stat_values(&row.edge_stats, chains)
        )?;
    }

    Ok(())
}

/// One row per clone, metadata columns last
fn save_node_summary(result: &CommunityResult, dir: &Path) -> Result<()> {
    let mut file = BufWriter::new(File::create(dir.join("node_summary.csv"))?);

    let metadata_keys: Vec<&String> = result
        .node_summary
        .iter()
        .flat_map(|n| n.metadata.keys())
        .unique()
        .sorted()
        .collect();

    let mut header = String::from("id,sample,clone_size,community,community_size,degree,strength");
    for key in &metadata_keys {
        header.push(',');
        header.push_str(&csv_field(key));
    }
    writeln!(file, "{}", header)?;

    for node in &result.node_summary {
        let metadata = metadata_keys
            .iter()
            .map(|key| match node.metadata.get(*key) {
                Some(serde_json::Value::String(s)) => csv_field(s),
                Some(serde_json::Value::Null) | None => String::new(),
                Some(other) => csv_field(&other.to_string()),
            })
            .collect::<Vec<_>>();

        write!(
            file,
            "{},{},{},{},{},{},{:.6}",
            csv_field(&node.id),
            csv_field(&node.sample),
            node.clone_size,
            node.community,
            node.community_size,
            node.degree,
            node.strength
        )?;
        for value in metadata {
            write!(file, ",{}", value)?;
        }
        writeln!(file)?;
    }

    Ok(())
}

/// Consolidated edges with combined and per-chain weights
fn save_edges(result: &CommunityResult, dir: &Path) -> Result<()> {
    let chains = &result.input_config.chains;
    let graph = result.graph.graph();
    let mut file = BufWriter::new(File::create(dir.join("edges.csv"))?);

    writeln!(
        file,
        "from,to,combined_weight,{},community",
        chains.iter().map(|c| format!("w_{}", c)).join(",")
    )?;

    for edge in graph.edge_references() {
        let source = &graph[edge.source()];
        let target = &graph[edge.target()];
        let cs = result.graph.community_of(edge.source());
        let ct = result.graph.community_of(edge.target());

        // Empty community cell for edges between communities
        let community = if cs == ct { cs.to_string() } else { String::new() };
        let weights = chains
            .iter()
            .map(|&c| {
                edge.weight()
                    .weights
                    .get(c)
                    .map(|w| format!("{:.6}", w))
                    .unwrap_or_default()
            })
            .join(",");

        writeln!(
            file,
            "{},{},{:.6},{},{}",
            csv_field(&source.id),
            csv_field(&target.id),
            edge.weight().combined_weight,
            weights,
            community
        )?;
    }

    Ok(())
}

/// Configuration echo and headline counts
fn save_summary(result: &CommunityResult, dir: &Path) -> Result<()> {
    let mut file = File::create(dir.join("summary.json"))?;
    let graph = result.graph.graph();
    let wide = &result.community_summary.wide;

    let singletons = wide.iter().filter(|c| c.clones == 1).count();
    let largest = wide.iter().map(|c| c.clones).max().unwrap_or(0);

    let summary = json!({
        "input_config": result.input_config,
        "graph_stats": {
            "node_count": graph.node_count(),
            "edge_count": graph.edge_count(),
            "sample_count": result.community_occupancy_matrix.samples.len(),
            "total_cells": result.community_occupancy_matrix.total(),
        },
        "community_stats": {
            "community_count": wide.len(),
            "singleton_count": singletons,
            "largest_community_size": largest,
            "modularity": result.graph.modularity(),
        }
    });

    file.write_all(to_string_pretty(&summary)?.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommunityConfig;
    use crate::detect::detect_communities;
    use crate::graph::builder::ChainScores;
    use crate::graph::RepertoireGraphBuilder;

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_save_results_writes_all_tables() {
        let mut builder = RepertoireGraphBuilder::with_capacity(3);
        builder.add_clone("A", "x", 3).unwrap();
        builder.add_clone("B", "x", 5).unwrap();
        builder.add_clone("C", "y", 2).unwrap();
        builder.add_edge("A", "B", Chain::Cdr3b, ChainScores::uniform(30.0, 0.9));
        let graph = builder.build().unwrap();

        let config = CommunityConfig::default().with_seed(1);
        let result = detect_communities(&graph, &config).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_str().unwrap();
        save_results(&result, out).unwrap();

        for name in [
            "community_occupancy_matrix.csv",
            "community_summary_wide.csv",
            "community_summary_tall.csv",
            "node_summary.csv",
            "edges.csv",
            "summary.json",
        ] {
            assert!(dir.path().join(name).exists(), "missing {}", name);
        }

        let matrix = fs::read_to_string(dir.path().join("community_occupancy_matrix.csv")).unwrap();
        assert_eq!(matrix.lines().next(), Some("community,x,y"));
        assert_eq!(matrix.lines().count(), 1 + result.community_summary.wide.len());

        let wide = fs::read_to_string(dir.path().join("community_summary_wide.csv")).unwrap();
        assert!(wide
            .lines()
            .next()
            .unwrap()
            .ends_with("w,w_CDR3a,w_CDR3b,n_CDR3a,n_CDR3b"));

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("summary.json")).unwrap())
                .unwrap();
        assert_eq!(summary["graph_stats"]["total_cells"], 10);
        assert_eq!(summary["input_config"]["algorithm"], "leiden");
    }
}
