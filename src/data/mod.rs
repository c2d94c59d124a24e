//! Loading clone similarity graphs from disk

pub mod json;
pub mod parquet;

pub use json::{load_graph_json, parse_graph_json};
pub use parquet::load_graph_parquet;
