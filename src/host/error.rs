//! Collaborator error types

use thiserror::Error;

/// Failure reported by one of the host collaborators
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    /// The collaborator does not offer this capability at all
    #[error("{operation} is not supported by the host")]
    Unsupported { operation: String },
    /// The host understood the request and declined it
    #[error("host refused request: {reason}")]
    Refused { reason: String },
    /// Network or transport failure while talking to a remote end
    #[error("transport error: {message}")]
    Transport { message: String },
    /// Location provider failure
    #[error("provider error: {message}")]
    Provider { message: String },
}

/// Result type for collaborator calls
pub type HostResult<T> = Result<T, HostError>;

impl HostError {
    /// Transport failures may succeed on a later cycle; the rest will not
    pub fn is_transient(&self) -> bool {
        matches!(self, HostError::Transport { .. })
    }
}
