//! Error types for the scanning context

/// Scanning context errors
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The scanning task has stopped
    #[error("scan context is closed")]
    Closed,

    /// Inbound message could not be decoded
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}
