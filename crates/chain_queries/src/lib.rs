//! Typed queries against the hub and the DA chain.
//!
//! Everything here goes through a [`chain_client::ChainClient`] and turns its
//! raw JSON/YAML output into typed values. Transport failures and malformed
//! responses are kept apart in [`QueryError`] so callers can retry the former
//! and abort on the latter.

pub mod block_info;
pub mod sequencers;
pub mod state_path;

use chain_client::ChainClientError;
use thiserror::Error;

pub use block_info::{BlockInfo, BlockInfoResolver};
pub use sequencers::{
    SequencerMetadata, SequencerRecord, SequencerRegistry, SnapshotInfo, StateIndexEntry,
};
pub use state_path::{extract_height_from_state_path, extract_namespace_from_state_path};

/// Errors that can occur while querying a chain.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("chain query failed: {0}")]
    Chain(#[from] ChainClientError),
    #[error("invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML response: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("response is missing field `{0}`")]
    MissingField(&'static str),
    #[error("malformed {field}: {reason}")]
    Malformed { field: &'static str, reason: String },
}

impl QueryError {
    /// Whether the remote could not be reached (as opposed to answering with
    /// data we cannot interpret).
    pub fn is_transport(&self) -> bool {
        matches!(self, QueryError::Chain(e) if e.is_unreachable())
    }
}

/// Result type for chain queries.
pub type Result<T> = std::result::Result<T, QueryError>;
