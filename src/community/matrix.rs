//! Community-by-repertoire occupancy matrix

use crate::community::PartitionedGraph;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cells per community (rows) and repertoire (columns)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyMatrix {
    /// Row labels: every observed community
    pub communities: Vec<usize>,

    /// Column labels: every observed repertoire
    pub samples: Vec<String>,

    /// Summed clone sizes; absent combinations are 0
    pub counts: Array2<u64>,
}

impl OccupancyMatrix {
    /// Cross-tabulate total cells per community and repertoire
    pub fn from_partition(partitioned: &PartitionedGraph) -> Self {
        let communities: Vec<usize> = partitioned.labels().into_iter().collect();

        let mut samples: Vec<String> = partitioned
            .nodes()
            .map(|(_, node, _)| node.sample.clone())
            .collect();
        samples.sort_unstable();
        samples.dedup();

        let row_of: HashMap<usize, usize> =
            communities.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        let col_of: HashMap<&str, usize> = samples
            .iter()
            .enumerate()
            .map(|(j, s)| (s.as_str(), j))
            .collect();

        let mut counts = Array2::<u64>::zeros((communities.len(), samples.len()));
        for (_, node, community) in partitioned.nodes() {
            let row = row_of[&community];
            let col = col_of[node.sample.as_str()];
            counts[[row, col]] += node.clone_size;
        }

        log::debug!(
            "Built {}x{} occupancy matrix",
            communities.len(),
            samples.len()
        );

        Self {
            communities,
            samples,
            counts,
        }
    }

    /// Cells of `community` in `sample`, 0 for unobserved labels
    pub fn get(&self, community: usize, sample: &str) -> u64 {
        let row = self.communities.iter().position(|&c| c == community);
        let col = self.samples.iter().position(|s| s == sample);
        match (row, col) {
            (Some(row), Some(col)) => self.counts[[row, col]],
            _ => 0,
        }
    }

    /// Total cells of one community across repertoires
    pub fn community_total(&self, community: usize) -> u64 {
        self.communities
            .iter()
            .position(|&c| c == community)
            .map_or(0, |row| self.counts.row(row).sum())
    }

    /// Total cells per repertoire, in column order
    pub fn sample_totals(&self) -> Vec<u64> {
        self.counts.sum_axis(Axis(0)).to_vec()
    }

    pub fn total(&self) -> u64 {
        self.counts.sum()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.counts.dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CloneNode, ConsolidatedGraph};

    fn partitioned(nodes: &[(&str, u64)], labels: Vec<usize>) -> PartitionedGraph {
        let mut graph = ConsolidatedGraph::default();
        for (i, &(sample, size)) in nodes.iter().enumerate() {
            graph.add_node(CloneNode::new(format!("c{}", i), sample, size));
        }
        PartitionedGraph::new(graph, labels, 0.0)
    }

    #[test]
    fn test_matrix_sums_clone_sizes() {
        let p = partitioned(&[("x", 3), ("x", 5), ("y", 2), ("y", 4)], vec![10, 10, 10, 3]);
        let m = OccupancyMatrix::from_partition(&p);

        assert_eq!(m.communities, vec![3, 10]);
        assert_eq!(m.samples, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(m.get(10, "x"), 8);
        assert_eq!(m.get(10, "y"), 2);
        // Community 3 has no clones in x: zero, not absent
        assert_eq!(m.get(3, "x"), 0);
        assert_eq!(m.get(3, "y"), 4);
        assert_eq!(m.community_total(10), 10);
        assert_eq!(m.sample_totals(), vec![8, 6]);
        assert_eq!(m.total(), 14);
        assert_eq!(m.shape(), (2, 2));
    }

    #[test]
    fn test_unknown_labels_read_as_zero() {
        let p = partitioned(&[("x", 1)], vec![0]);
        let m = OccupancyMatrix::from_partition(&p);
        assert_eq!(m.get(5, "x"), 0);
        assert_eq!(m.get(0, "z"), 0);
        assert_eq!(m.community_total(5), 0);
    }
}
