//! End-to-end community detection over a clone similarity graph

use crate::community::{
    partition_graph, summarize_communities, summarize_nodes, CommunitySummaries, NodeSummary,
    OccupancyMatrix, PartitionedGraph,
};
use crate::config::CommunityConfig;
use crate::error::Result;
use crate::graph::{consolidate_edges, RepertoireGraph};

/// Everything one detection run produces
#[derive(Debug, Clone)]
pub struct CommunityResult {
    /// Cells per community and repertoire
    pub community_occupancy_matrix: OccupancyMatrix,

    /// Per-community statistics in wide and tall layouts
    pub community_summary: CommunitySummaries,

    /// Per-clone community assignment and degree
    pub node_summary: Vec<NodeSummary>,

    /// Consolidated graph with community labels
    pub graph: PartitionedGraph,

    /// Echo of the validated configuration
    pub input_config: CommunityConfig,
}

/// Consolidate, partition and summarize a clone similarity graph.
///
/// The graph is validated before the configuration, and nothing runs unless
/// both are valid. The input graph is never modified.
pub fn detect_communities(
    graph: &RepertoireGraph,
    config: &CommunityConfig,
) -> Result<CommunityResult> {
    graph.validate()?;
    config.validate()?;

    log::info!(
        "Starting community detection on {} clones from {} repertoires",
        graph.node_count(),
        graph.samples().len()
    );

    // 1. Edge consolidation
    let consolidated = consolidate_edges(graph, config);

    // 2. Partitioning
    let partitioned = partition_graph(consolidated, config)?;

    // 3. Occupancy matrix
    let community_occupancy_matrix = OccupancyMatrix::from_partition(&partitioned);

    // 4. Summaries
    let community_summary = summarize_communities(&partitioned, &config.chains);
    let node_summary = summarize_nodes(&partitioned);

    log::info!(
        "Community detection complete: {} communities",
        community_summary.wide.len()
    );

    Ok(CommunityResult {
        community_occupancy_matrix,
        community_summary,
        node_summary,
        graph: partitioned,
        input_config: config.clone(),
    })
}

/// Like [`detect_communities`], taking policy names as strings.
///
/// Violations are reported in the order graph, algorithm, resolution,
/// weight, metric, chains.
pub fn detect_communities_by_name<S: AsRef<str>>(
    graph: &RepertoireGraph,
    algorithm: &str,
    resolution: f64,
    weight: &str,
    metric: &str,
    chains: &[S],
) -> Result<CommunityResult> {
    graph.validate()?;
    let config = CommunityConfig::from_names(algorithm, resolution, weight, metric, chains)?;
    detect_communities(graph, &config)
}
