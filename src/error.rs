//! Error types for the catalog synchronization engine.
//!
//! Each concern gets its own enum so callers can tell a fatal storage failure
//! from a per-record transport hiccup. [`SyncError`] is the umbrella the
//! orchestrator returns.

use crate::types::{RecordId, StatusCode};
use thiserror::Error;

/// Failure talking to a remote host.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Failed to read response body from {url}: {message}")]
    Body { url: String, message: String },

    #[error("Invalid request target {0}")]
    InvalidTarget(String),
}

/// Failure while walking the index. Always fatal to the run.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Transport error while fetching index: {0}")]
    Transport(#[from] TransportError),

    #[error("Index document {path} returned status {status} {reason}")]
    Status {
        path: String,
        status: StatusCode,
        reason: String,
    },

    #[error("Index document {path} is malformed: {message}")]
    Malformed { path: String, message: String },
}

/// Catalog persistence failure. Always fatal: without a durable commit the
/// run cannot be resumed safely.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Record encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt catalog key of {0} bytes")]
    CorruptKey(usize),

    #[error("Record {0} is not in the catalog")]
    UnknownRecord(RecordId),

    #[error("Invalid record {id}: {message}")]
    InvalidRecord { id: RecordId, message: String },
}

/// Invalid or incomplete configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("An API key is required for enrichment (--api-key or ITEMSYNC__ENRICHMENT__API_KEY)")]
    MissingApiKey,

    #[error("Configuration source error: {0}")]
    Source(#[from] config::ConfigError),
}

/// Top-level error for a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration failed: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport setup failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}
