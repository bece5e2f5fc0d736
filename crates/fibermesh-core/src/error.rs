//! Error types for fibermesh

use thiserror::Error;

/// Main error type for fiber operations
#[derive(Error, Debug)]
pub enum FiberError {
    /// A required configuration option is missing or invalid
    #[error("Config error: {0}")]
    Config(String),

    /// Binding the publish endpoint failed
    #[error("Bind error: {0}")]
    Bind(String),

    /// Connecting the subscribe endpoint to a peer failed
    #[error("Connect error: {0}")]
    Connect(String),

    /// The discovery callback reported a failure
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Rebuilding the subscribe endpoint during reconciliation failed
    #[error("Reconciliation error: {0}")]
    Reconcile(String),

    /// Operation attempted after the fiber was disposed
    #[error("Fiber has been disposed")]
    Disposed,

    /// Envelope encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using FiberError
pub type FiberResult<T> = Result<T, FiberError>;
