//! Error taxonomy shared by the Warden crates.
//!
//! The decision components never return these; they degrade to "no action".
//! Collaborators (fleet clients, manifest providers, the control loop) do.

use thiserror::Error;

/// Result type alias for collaborator-facing operations.
pub type WardenResult<T> = Result<T, WardenError>;

/// Errors surfaced by collaborators and the orchestration loop.
#[derive(Debug, Error)]
pub enum WardenError {
    /// A referenced pod, slot or namespace does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The namespace is not on the allow-list.
    #[error("namespace not allow-listed: {0}")]
    Forbidden(String),

    /// A version token failed to decode.
    #[error("invalid version token: {0}")]
    Invalid(#[from] TokenError),

    /// A repository is frozen by the cross-pod safety gate.
    #[error("repository frozen: {0}")]
    Frozen(String),

    /// The consecutive-error budget was exhausted.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("state store error: {0}")]
    State(String),

    #[error("no manifest provider can handle source: {0}")]
    UnsupportedSource(String),
}

impl From<std::io::Error> for WardenError {
    fn from(e: std::io::Error) -> Self {
        WardenError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for WardenError {
    fn from(e: serde_json::Error) -> Self {
        WardenError::Serialization(e.to_string())
    }
}

/// Reasons a version token is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is not valid base64: {0}")]
    Encoding(String),

    #[error("token payload is malformed: {0}")]
    Payload(String),

    #[error("token carries no creation timestamp")]
    MissingTimestamp,
}
