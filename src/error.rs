//! Error types for the store mirror.

use crate::types::ObserverId;
use thiserror::Error;

/// Main error type for store and mirror operations.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Reducer rejected action: {0}")]
    Reducer(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Observer not found: {0}")]
    ObserverNotFound(ObserverId),

    #[error("Channel disconnected")]
    Disconnected,

    #[error("Mirror thread panicked")]
    ThreadPanicked,
}

impl From<serde_json::Error> for MirrorError {
    fn from(e: serde_json::Error) -> Self {
        MirrorError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for MirrorError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        MirrorError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for MirrorError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        MirrorError::Deserialization(e.to_string())
    }
}

/// Result type for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;
