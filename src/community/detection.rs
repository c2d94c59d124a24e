//! Community partitioning over consolidated edge weights

use crate::community::leiden::Leiden;
use crate::community::louvain::Louvain;
use crate::community::PartitionedGraph;
use crate::config::{Algorithm, CommunityConfig};
use crate::error::{CommunityError, Result};
use crate::graph::ConsolidatedGraph;
use petgraph::visit::EdgeRef;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, VecDeque};

/// Strict improvement required before a node changes community
pub(crate) const MIN_GAIN: f64 = 1e-10;

/// A modularity-style graph partitioning algorithm
pub trait Partitioner {
    /// Assign a community label to every node, indexed like the graph's nodes
    fn detect(&self, graph: &ConsolidatedGraph) -> Result<Vec<usize>>;

    /// Resolution parameter (gamma)
    fn resolution(&self) -> f64;
}

/// Build the partitioner named by the configuration
pub fn partitioner_for(config: &CommunityConfig) -> Box<dyn Partitioner + Send + Sync> {
    match config.algorithm {
        Algorithm::Louvain => Box::new(
            Louvain::new()
                .with_resolution(config.resolution)
                .with_max_iter(config.max_iterations)
                .with_max_levels(config.max_levels)
                .with_seed(config.seed),
        ),
        Algorithm::Leiden => Box::new(
            Leiden::new()
                .with_resolution(config.resolution)
                .with_max_iter(config.max_iterations)
                .with_max_levels(config.max_levels)
                .with_seed(config.seed),
        ),
    }
}

/// Partition the consolidated graph into communities.
///
/// The configuration is taken as validated.
pub fn partition_graph(
    graph: ConsolidatedGraph,
    config: &CommunityConfig,
) -> Result<PartitionedGraph> {
    log::info!(
        "Detecting communities with {} (resolution={}) on {} nodes and {} edges",
        config.algorithm,
        config.resolution,
        graph.node_count(),
        graph.edge_count()
    );

    let partitioner = partitioner_for(config);
    let labels = partitioner.detect(&graph)?;

    if labels.len() != graph.node_count() {
        return Err(CommunityError::data(format!(
            "partitioner labelled {} of {} nodes",
            labels.len(),
            graph.node_count()
        )));
    }

    let modularity =
        WeightedGraph::from_consolidated(&graph).modularity(&labels, partitioner.resolution());
    let partitioned = PartitionedGraph::new(graph, labels, modularity);

    log::info!(
        "Found {} communities (modularity {:.4})",
        partitioned.community_count(),
        modularity
    );

    Ok(partitioned)
}

/// Seeded generator for node visiting order
pub(crate) fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Adjacency view of a weighted graph, possibly aggregated
pub(crate) struct WeightedGraph {
    pub n: usize,
    /// Adjacency: node -> [(neighbor, weight)], self-loops excluded
    pub adj: Vec<Vec<(usize, f64)>>,
    /// Internal weight folded into each node by aggregation
    pub self_loops: Vec<f64>,
    /// Weighted degree, self-loops counted twice
    pub degrees: Vec<f64>,
    /// Sum of degrees (2m)
    pub total_weight: f64,
}

impl WeightedGraph {
    pub fn from_consolidated(graph: &ConsolidatedGraph) -> Self {
        let edges: Vec<(usize, usize, f64)> = graph
            .edge_references()
            .map(|e| {
                (
                    e.source().index(),
                    e.target().index(),
                    e.weight().combined_weight,
                )
            })
            .collect();

        Self::from_parts(graph.node_count(), &edges, vec![0.0; graph.node_count()])
    }

    pub fn from_parts(n: usize, edges: &[(usize, usize, f64)], self_loops: Vec<f64>) -> Self {
        let mut adj = vec![Vec::new(); n];
        let mut degrees: Vec<f64> = self_loops.iter().map(|sl| 2.0 * sl).collect();

        for &(i, j, w) in edges {
            adj[i].push((j, w));
            adj[j].push((i, w));
            degrees[i] += w;
            degrees[j] += w;
        }

        let total_weight = degrees.iter().sum();

        Self {
            n,
            adj,
            self_loops,
            degrees,
            total_weight,
        }
    }

    /// Contract each community of `partition` (labels `0..k`) into one node
    pub fn aggregate(&self, partition: &[usize], k: usize) -> Self {
        let mut self_loops = vec![0.0; k];
        let mut between: BTreeMap<(usize, usize), f64> = BTreeMap::new();

        for i in 0..self.n {
            let ci = partition[i];
            self_loops[ci] += self.self_loops[i];

            for &(j, w) in &self.adj[i] {
                if i >= j {
                    continue;
                }
                let cj = partition[j];
                if ci == cj {
                    self_loops[ci] += w;
                } else {
                    let key = if ci < cj { (ci, cj) } else { (cj, ci) };
                    *between.entry(key).or_insert(0.0) += w;
                }
            }
        }

        let edges: Vec<(usize, usize, f64)> =
            between.into_iter().map(|((i, j), w)| (i, j, w)).collect();

        Self::from_parts(k, &edges, self_loops)
    }

    /// Summed edge weight from `node` into each neighboring community
    pub fn neighbor_community_weights(
        &self,
        node: usize,
        communities: &[usize],
    ) -> BTreeMap<usize, f64> {
        let mut weights = BTreeMap::new();
        for &(neighbor, w) in &self.adj[node] {
            *weights.entry(communities[neighbor]).or_insert(0.0) += w;
        }
        weights
    }

    /// Pick the community maximizing the modularity gain of inserting `node`.
    ///
    /// `comm_total` must not include `node`'s own degree. Ties keep `current`.
    pub fn best_community(
        &self,
        node: usize,
        current: usize,
        communities: &[usize],
        comm_total: &[f64],
        resolution: f64,
    ) -> usize {
        let ki = self.degrees[node];
        let m2 = self.total_weight;
        let links = self.neighbor_community_weights(node, communities);

        let gain = |comm: usize, k_in: f64| k_in - resolution * comm_total[comm] * ki / m2;

        let mut best = current;
        let mut best_gain = gain(current, links.get(&current).copied().unwrap_or(0.0));

        for (&comm, &k_in) in &links {
            let g = gain(comm, k_in);
            if g > best_gain + MIN_GAIN {
                best_gain = g;
                best = comm;
            }
        }

        best
    }

    /// Weighted modularity with resolution of a partition
    pub fn modularity(&self, communities: &[usize], resolution: f64) -> f64 {
        if self.total_weight == 0.0 {
            return 0.0;
        }
        let m2 = self.total_weight;

        let mut internal: BTreeMap<usize, f64> = BTreeMap::new();
        let mut totals: BTreeMap<usize, f64> = BTreeMap::new();

        for i in 0..self.n {
            let ci = communities[i];
            *totals.entry(ci).or_insert(0.0) += self.degrees[i];
            *internal.entry(ci).or_insert(0.0) += 2.0 * self.self_loops[i];
            for &(j, w) in &self.adj[i] {
                if communities[j] == ci {
                    // Each internal edge is seen from both ends
                    *internal.entry(ci).or_insert(0.0) += w;
                }
            }
        }

        totals
            .iter()
            .map(|(c, &tot)| {
                let inside = internal.get(c).copied().unwrap_or(0.0);
                inside / m2 - resolution * (tot / m2) * (tot / m2)
            })
            .sum()
    }
}

/// Split every community into its connected components.
///
/// Returns labels `0..r` assigned in order of each component's lowest node.
pub(crate) fn split_disconnected(wg: &WeightedGraph, communities: &[usize]) -> Vec<usize> {
    let mut refined = vec![usize::MAX; wg.n];
    let mut next = 0;

    for start in 0..wg.n {
        if refined[start] != usize::MAX {
            continue;
        }

        let comm = communities[start];
        let mut queue = VecDeque::new();
        refined[start] = next;
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            for &(neighbor, _) in &wg.adj[node] {
                if refined[neighbor] == usize::MAX && communities[neighbor] == comm {
                    refined[neighbor] = next;
                    queue.push_back(neighbor);
                }
            }
        }

        next += 1;
    }

    refined
}

/// Renumber labels to consecutive integers starting at 0, preserving order
pub(crate) fn renumber(labels: &[usize]) -> (Vec<usize>, usize) {
    let mut unique: Vec<usize> = labels.to_vec();
    unique.sort_unstable();
    unique.dedup();

    let mapping: BTreeMap<usize, usize> = unique
        .iter()
        .enumerate()
        .map(|(new, &old)| (old, new))
        .collect();

    let renumbered = labels
        .iter()
        .map(|c| mapping.get(c).copied().unwrap_or(0))
        .collect();

    (renumbered, unique.len())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{Chain, Metric, WeightField};
    use crate::graph::{ChainWeights, CloneNode, ConsolidatedEdge};
    use petgraph::graph::NodeIndex;

    /// Consolidated graph from a weighted edge list
    pub(crate) fn weighted_graph(n: usize, edges: &[(usize, usize, f64)]) -> ConsolidatedGraph {
        let mut graph = ConsolidatedGraph::with_capacity(n, edges.len());
        for i in 0..n {
            graph.add_node(CloneNode::new(format!("c{}", i), "s", 1));
        }
        for &(i, j, w) in edges {
            let mut weights = ChainWeights::default();
            weights.insert(Chain::Cdr3b, w);
            graph.add_edge(
                NodeIndex::new(i),
                NodeIndex::new(j),
                ConsolidatedEdge {
                    weights,
                    combined_weight: w,
                },
            );
        }
        graph
    }

    /// Two triangles joined by a single weak bridge
    pub(crate) fn two_cliques() -> ConsolidatedGraph {
        weighted_graph(
            6,
            &[
                (0, 1, 1.0),
                (1, 2, 1.0),
                (0, 2, 1.0),
                (3, 4, 1.0),
                (4, 5, 1.0),
                (3, 5, 1.0),
                (2, 3, 0.1),
            ],
        )
    }

    #[test]
    fn test_modularity_of_two_cliques() {
        let wg = WeightedGraph::from_consolidated(&two_cliques());
        let split = wg.modularity(&[0, 0, 0, 1, 1, 1], 1.0);
        let merged = wg.modularity(&[0; 6], 1.0);
        assert!(split > merged);
        assert!(merged.abs() < 1e-12);
    }

    #[test]
    fn test_aggregation_preserves_total_weight() {
        let wg = WeightedGraph::from_consolidated(&two_cliques());
        let agg = wg.aggregate(&[0, 0, 0, 1, 1, 1], 2);
        assert_eq!(agg.n, 2);
        assert!((agg.total_weight - wg.total_weight).abs() < 1e-12);
        assert!((agg.self_loops[0] - 3.0).abs() < 1e-12);
        assert_eq!(agg.adj[0], vec![(1, 0.1)]);

        // Modularity is invariant under aggregation
        let q_fine = wg.modularity(&[0, 0, 0, 1, 1, 1], 1.0);
        let q_coarse = agg.modularity(&[0, 1], 1.0);
        assert!((q_fine - q_coarse).abs() < 1e-12);
    }

    #[test]
    fn test_split_disconnected() {
        // 0-1 connected, 2 isolated, all claimed by community 7
        let wg = WeightedGraph::from_consolidated(&weighted_graph(3, &[(0, 1, 1.0)]));
        let refined = split_disconnected(&wg, &[7, 7, 7]);
        assert_eq!(refined, vec![0, 0, 1]);
    }

    #[test]
    fn test_renumber() {
        let (labels, k) = renumber(&[9, 4, 9, 2]);
        assert_eq!(labels, vec![2, 1, 2, 0]);
        assert_eq!(k, 3);
    }

    #[test]
    fn test_partition_graph_labels_every_node() {
        let config = CommunityConfig::new(
            Algorithm::Louvain,
            1.0,
            WeightField::Nweight,
            Metric::Average,
            vec![Chain::Cdr3b],
        )
        .with_seed(7);
        let partitioned = partition_graph(two_cliques(), &config).unwrap();
        assert_eq!(partitioned.communities().len(), 6);
        assert_eq!(partitioned.community_count(), 2);
        assert!(partitioned.modularity() > 0.0);
    }
}
