//! Error types for the community detection pipeline

use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, CommunityError>;

/// Failures raised before any pipeline stage runs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommunityError {
    /// Invalid or missing parameter
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed or empty graph
    #[error("Data error: {0}")]
    Data(String),
}

impl CommunityError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::Data(message.into())
    }
}
