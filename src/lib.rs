//! Core library functions for the repertoire community analyzer

pub mod community;
pub mod config;
pub mod data;
pub mod detect;
pub mod error;
pub mod graph;
pub mod storage;

pub use config::{Algorithm, Chain, CommunityConfig, Metric, WeightField};
pub use detect::{detect_communities, detect_communities_by_name, CommunityResult};
pub use error::{CommunityError, Result};
pub use graph::{RepertoireGraph, RepertoireGraphBuilder};
