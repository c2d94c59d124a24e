//! Configuration management for community detection

use crate::error::{CommunityError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Receptor chain whose CDR3 similarity is scored independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Chain {
    #[serde(rename = "CDR3a")]
    Cdr3a,
    #[serde(rename = "CDR3b")]
    Cdr3b,
    #[serde(rename = "CDR3g")]
    Cdr3g,
    #[serde(rename = "CDR3d")]
    Cdr3d,
    #[serde(rename = "CDR3h")]
    Cdr3h,
    #[serde(rename = "CDR3l")]
    Cdr3l,
}

impl Chain {
    /// Every chain in enumeration order
    pub const ALL: [Chain; 6] = [
        Chain::Cdr3a,
        Chain::Cdr3b,
        Chain::Cdr3g,
        Chain::Cdr3d,
        Chain::Cdr3h,
        Chain::Cdr3l,
    ];

    /// Position of the chain in `Chain::ALL`
    pub fn index(self) -> usize {
        match self {
            Chain::Cdr3a => 0,
            Chain::Cdr3b => 1,
            Chain::Cdr3g => 2,
            Chain::Cdr3d => 3,
            Chain::Cdr3h => 4,
            Chain::Cdr3l => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Chain::Cdr3a => "CDR3a",
            Chain::Cdr3b => "CDR3b",
            Chain::Cdr3g => "CDR3g",
            Chain::Cdr3d => "CDR3d",
            Chain::Cdr3h => "CDR3h",
            Chain::Cdr3l => "CDR3l",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = CommunityError;

    fn from_str(s: &str) -> Result<Self> {
        Chain::ALL
            .iter()
            .copied()
            .find(|chain| chain.as_str() == s)
            .ok_or_else(|| {
                CommunityError::configuration(format!(
                    "unknown chain '{}', expected one of CDR3a, CDR3b, CDR3g, CDR3d, CDR3h, CDR3l",
                    s
                ))
            })
    }
}

/// Community partitioning algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Fast greedy multilevel modularity optimization
    Louvain,
    /// Quality-based optimization with a connectivity refinement phase
    Leiden,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Louvain => "louvain",
            Algorithm::Leiden => "leiden",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = CommunityError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "louvain" => Ok(Algorithm::Louvain),
            "leiden" => Ok(Algorithm::Leiden),
            other => Err(CommunityError::configuration(format!(
                "unknown algorithm '{}', expected 'louvain' or 'leiden'",
                other
            ))),
        }
    }
}

/// Edge score used as the per-chain similarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightField {
    /// Length-normalized score over the full CDR3
    Nweight,
    /// Length-normalized score over the trimmed CDR3 core
    Ncweight,
}

impl WeightField {
    pub fn as_str(self) -> &'static str {
        match self {
            WeightField::Nweight => "nweight",
            WeightField::Ncweight => "ncweight",
        }
    }
}

impl fmt::Display for WeightField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeightField {
    type Err = CommunityError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nweight" => Ok(WeightField::Nweight),
            "ncweight" => Ok(WeightField::Ncweight),
            other => Err(CommunityError::configuration(format!(
                "unknown weight '{}', expected 'nweight' or 'ncweight'",
                other
            ))),
        }
    }
}

/// Policy reconciling per-chain scores into one combined weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Average,
    Strict,
    Loose,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Average => "average",
            Metric::Strict => "strict",
            Metric::Loose => "loose",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = CommunityError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "average" => Ok(Metric::Average),
            "strict" => Ok(Metric::Strict),
            "loose" => Ok(Metric::Loose),
            other => Err(CommunityError::configuration(format!(
                "unknown metric '{}', expected 'average', 'strict' or 'loose'",
                other
            ))),
        }
    }
}

/// Parameters of one community detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityConfig {
    /// Partitioning algorithm
    pub algorithm: Algorithm,

    /// Resolution parameter; higher values give more, smaller communities
    pub resolution: f64,

    /// Edge score selected as the per-chain weight
    pub weight: WeightField,

    /// Combination policy for multi-chain edges
    pub metric: Metric,

    /// Chains whose edges are kept (one or two)
    pub chains: Vec<Chain>,

    /// Seed for the partitioner's node ordering; `None` seeds from entropy
    pub seed: Option<u64>,

    /// Maximum local-moving sweeps per level
    pub max_iterations: usize,

    /// Maximum aggregation levels
    pub max_levels: usize,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Leiden,
            resolution: 1.0,
            weight: WeightField::Ncweight,
            metric: Metric::Average,
            chains: vec![Chain::Cdr3a, Chain::Cdr3b],
            seed: None,
            max_iterations: 100,
            max_levels: 10,
        }
    }
}

impl CommunityConfig {
    /// Create a configuration with custom values and default tuning knobs
    pub fn new(
        algorithm: Algorithm,
        resolution: f64,
        weight: WeightField,
        metric: Metric,
        chains: Vec<Chain>,
    ) -> Self {
        Self {
            algorithm,
            resolution,
            weight,
            metric,
            chains,
            ..Self::default()
        }
    }

    /// Parse policy names, reporting the first violation in argument order
    pub fn from_names<S: AsRef<str>>(
        algorithm: &str,
        resolution: f64,
        weight: &str,
        metric: &str,
        chains: &[S],
    ) -> Result<Self> {
        let algorithm = algorithm.parse::<Algorithm>()?;
        validate_resolution(resolution)?;
        let weight = weight.parse::<WeightField>()?;
        let metric = metric.parse::<Metric>()?;
        let chains = chains
            .iter()
            .map(|c| c.as_ref().parse::<Chain>())
            .collect::<Result<Vec<_>>>()?;
        validate_chains(&chains)?;

        Ok(Self::new(algorithm, resolution, weight, metric, chains))
    }

    /// Set the partitioner seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check the numeric and chain-set constraints the enums cannot express
    pub fn validate(&self) -> Result<()> {
        validate_resolution(self.resolution)?;
        validate_chains(&self.chains)?;

        if self.max_iterations == 0 {
            return Err(CommunityError::configuration(
                "max_iterations must be at least 1",
            ));
        }
        if self.max_levels == 0 {
            return Err(CommunityError::configuration("max_levels must be at least 1"));
        }

        Ok(())
    }

    /// True when two chains are compared per edge
    pub fn is_paired(&self) -> bool {
        self.chains.len() == 2
    }
}

fn validate_resolution(resolution: f64) -> Result<()> {
    if !resolution.is_finite() || resolution <= 0.0 {
        return Err(CommunityError::configuration(format!(
            "resolution must be a positive number, got {}",
            resolution
        )));
    }
    Ok(())
}

fn validate_chains(chains: &[Chain]) -> Result<()> {
    if chains.is_empty() || chains.len() > 2 {
        return Err(CommunityError::configuration(format!(
            "chains must name one or two chains, got {}",
            chains.len()
        )));
    }
    if chains.len() == 2 && chains[0] == chains[1] {
        return Err(CommunityError::configuration(format!(
            "chain {} listed twice",
            chains[0]
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CommunityConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.algorithm, Algorithm::Leiden);
        assert_eq!(config.weight, WeightField::Ncweight);
        assert!(config.is_paired());
    }

    #[test]
    fn test_from_names() {
        let config =
            CommunityConfig::from_names("louvain", 0.5, "nweight", "strict", &["CDR3b"]).unwrap();
        assert_eq!(config.algorithm, Algorithm::Louvain);
        assert_eq!(config.resolution, 0.5);
        assert_eq!(config.weight, WeightField::Nweight);
        assert_eq!(config.metric, Metric::Strict);
        assert_eq!(config.chains, vec![Chain::Cdr3b]);
    }

    #[test]
    fn test_first_violation_reported() {
        // Bad algorithm and bad metric: algorithm is checked first
        let err = CommunityConfig::from_names("walktrap", 1.0, "nweight", "median", &["CDR3a"])
            .unwrap_err();
        assert!(matches!(err, CommunityError::Configuration(ref m) if m.contains("algorithm")));

        let err = CommunityConfig::from_names("leiden", 0.0, "weight", "average", &["CDR3a"])
            .unwrap_err();
        assert!(matches!(err, CommunityError::Configuration(ref m) if m.contains("resolution")));

        let err = CommunityConfig::from_names("leiden", 1.0, "cweight", "median", &["CDR3a"])
            .unwrap_err();
        assert!(matches!(err, CommunityError::Configuration(ref m) if m.contains("weight")));

        let err = CommunityConfig::from_names("leiden", 1.0, "ncweight", "median", &["CDR3x"])
            .unwrap_err();
        assert!(matches!(err, CommunityError::Configuration(ref m) if m.contains("metric")));
    }

    #[test]
    fn test_chain_set_bounds() {
        let empty: [&str; 0] = [];
        assert!(CommunityConfig::from_names("leiden", 1.0, "ncweight", "average", &empty).is_err());
        assert!(CommunityConfig::from_names(
            "leiden",
            1.0,
            "ncweight",
            "average",
            &["CDR3a", "CDR3b", "CDR3g"]
        )
        .is_err());
        assert!(CommunityConfig::from_names(
            "leiden",
            1.0,
            "ncweight",
            "average",
            &["CDR3a", "CDR3a"]
        )
        .is_err());
        assert!(CommunityConfig::from_names("leiden", 1.0, "ncweight", "average", &["CDR3q"])
            .is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_resolution() {
        let mut config = CommunityConfig::default();
        config.resolution = f64::NAN;
        assert!(config.validate().is_err());
        config.resolution = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chain_names_round_trip_through_serde() {
        let json = serde_json::to_string(&Chain::Cdr3h).unwrap();
        assert_eq!(json, "\"CDR3h\"");
        assert_eq!("CDR3l".parse::<Chain>().unwrap(), Chain::Cdr3l);
    }
}
