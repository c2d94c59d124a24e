//! Louvain algorithm for community detection.
//!
//! Fast greedy multilevel modularity optimization (Blondel et al. 2008):
//!
//! 1. **Local moving**: start with singletons and repeatedly move each node
//!    to the neighboring community with the highest modularity gain.
//! 2. **Aggregation**: contract communities into single nodes; internal
//!    weight becomes a self-loop.
//! 3. Repeat on the aggregated graph until no node moves.
//!
//! Louvain can leave a community internally disconnected; use
//! [`Leiden`](super::leiden::Leiden) when that matters.

use super::detection::{renumber, rng_from_seed, Partitioner, WeightedGraph};
use crate::error::{CommunityError, Result};
use crate::graph::ConsolidatedGraph;
use rand::seq::SliceRandom;
use rand::Rng;

/// Louvain community detection algorithm
#[derive(Debug, Clone)]
pub struct Louvain {
    /// Resolution parameter (gamma)
    resolution: f64,
    /// Maximum sweeps per level
    max_iter: usize,
    /// Maximum levels of aggregation
    max_levels: usize,
    /// Seed for the node visiting order
    seed: Option<u64>,
}

impl Louvain {
    pub fn new() -> Self {
        Self {
            resolution: 1.0,
            max_iter: 100,
            max_levels: 10,
            seed: None,
        }
    }

    /// Set resolution parameter.
    ///
    /// Higher values produce smaller communities.
    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_max_levels(mut self, levels: usize) -> Self {
        self.max_levels = levels;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Phase 1: sweep nodes in random order until no move improves modularity.
    /// Returns (communities, any node moved).
    fn local_moving<R: Rng>(&self, wg: &WeightedGraph, rng: &mut R) -> (Vec<usize>, bool) {
        let mut communities: Vec<usize> = (0..wg.n).collect();
        let mut comm_total = wg.degrees.clone();
        let mut order: Vec<usize> = (0..wg.n).collect();
        let mut any_moved = false;

        for _iter in 0..self.max_iter {
            order.shuffle(rng);
            let mut moved = false;

            for &node in &order {
                let current = communities[node];
                let ki = wg.degrees[node];

                comm_total[current] -= ki;
                let best = wg.best_community(
                    node,
                    current,
                    &communities,
                    &comm_total,
                    self.resolution,
                );
                comm_total[best] += ki;

                if best != current {
                    communities[node] = best;
                    moved = true;
                    any_moved = true;
                }
            }

            if !moved {
                break;
            }
        }

        (communities, any_moved)
    }
}

impl Default for Louvain {
    fn default() -> Self {
        Self::new()
    }
}

impl Partitioner for Louvain {
    fn detect(&self, graph: &ConsolidatedGraph) -> Result<Vec<usize>> {
        let n = graph.node_count();
        if n == 0 {
            return Err(CommunityError::data("cannot partition an empty graph"));
        }

        let mut wg = WeightedGraph::from_consolidated(graph);
        if wg.total_weight == 0.0 {
            // No edges: each node is its own community
            return Ok((0..n).collect());
        }

        let mut rng = rng_from_seed(self.seed);

        // membership[v] = aggregated node currently holding original node v
        let mut membership: Vec<usize> = (0..n).collect();

        for level in 0..self.max_levels {
            let (partition, moved) = self.local_moving(&wg, &mut rng);
            if !moved {
                break;
            }

            let (partition, k) = renumber(&partition);
            for m in membership.iter_mut() {
                *m = partition[*m];
            }

            log::debug!("Louvain level {}: {} -> {} nodes", level, wg.n, k);

            if k == wg.n {
                break;
            }
            wg = wg.aggregate(&partition, k);
        }

        Ok(renumber(&membership).0)
    }

    fn resolution(&self) -> f64 {
        self.resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::community::detection::tests::{two_cliques, weighted_graph};

    #[test]
    fn test_louvain_triangle() {
        let graph = weighted_graph(3, &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 1.0)]);
        let communities = Louvain::new().with_seed(Some(1)).detect(&graph).unwrap();

        assert_eq!(communities.len(), 3);
        assert_eq!(communities[0], communities[1]);
        assert_eq!(communities[1], communities[2]);
    }

    #[test]
    fn test_louvain_two_cliques() {
        let communities = Louvain::new()
            .with_seed(Some(42))
            .detect(&two_cliques())
            .unwrap();

        assert_eq!(communities.len(), 6);
        assert_eq!(communities[0], communities[1]);
        assert_eq!(communities[1], communities[2]);
        assert_eq!(communities[3], communities[4]);
        assert_eq!(communities[4], communities[5]);
        assert_ne!(communities[0], communities[3]);
    }

    #[test]
    fn test_louvain_empty_graph() {
        let graph = weighted_graph(0, &[]);
        assert!(Louvain::new().detect(&graph).is_err());
    }

    #[test]
    fn test_louvain_isolated_nodes() {
        let graph = weighted_graph(2, &[]);
        let communities = Louvain::new().detect(&graph).unwrap();
        assert_eq!(communities, vec![0, 1]);
    }

    #[test]
    fn test_louvain_seed_is_reproducible() {
        let graph = two_cliques();
        let a = Louvain::new().with_seed(Some(9)).detect(&graph).unwrap();
        let b = Louvain::new().with_seed(Some(9)).detect(&graph).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_louvain_high_resolution_splits() {
        let graph = two_cliques();
        let coarse = Louvain::new()
            .with_resolution(0.5)
            .with_seed(Some(3))
            .detect(&graph)
            .unwrap();
        let fine = Louvain::new()
            .with_resolution(20.0)
            .with_seed(Some(3))
            .detect(&graph)
            .unwrap();

        let count = |labels: &[usize]| labels.iter().max().map_or(0, |m| m + 1);
        assert!(count(&fine) >= count(&coarse));
        assert_eq!(count(&fine), 6);
    }
}
