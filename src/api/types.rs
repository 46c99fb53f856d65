//! Error taxonomy for the tracker

use crate::api::Advisory;
use crate::host::{HostError, ProviderErrorKind};
use crate::validation::FixRejection;
use thiserror::Error;

/// Result type for fallible tracker steps
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Everything that can go wrong inside the tracker.
///
/// None of these escape the public control operations; each is converted
/// at the boundary into a log event and, where the user can act on it, an
/// advisory.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    /// Location services are switched off device-wide
    #[error("location services are disabled")]
    ServiceUnavailable,
    #[error("location authorization denied")]
    AuthorizationDenied,
    #[error("location authorization restricted")]
    AuthorizationRestricted,
    /// Fix failed the validity filter; dropped silently
    #[error("sample rejected: {0}")]
    SampleRejected(#[from] FixRejection),
    /// Connectivity trouble in the provider; sampling carries on
    #[error("transient provider error: {0}")]
    ProviderTransient(String),
    #[error("provider error: {0}")]
    ProviderFatal(String),
    /// The host declined to extend execution time
    #[error("continuation not granted: {0}")]
    TokenGrantRefused(HostError),
    /// The scheduler task has exited
    #[error("scheduler is no longer running")]
    SchedulerClosed,
}

impl TrackerError {
    /// Classify an asynchronous provider failure
    pub fn from_provider(kind: &ProviderErrorKind) -> Self {
        match kind {
            ProviderErrorKind::Network => TrackerError::ProviderTransient("network unavailable".to_string()),
            ProviderErrorKind::Denied => TrackerError::AuthorizationDenied,
            ProviderErrorKind::Other(detail) => TrackerError::ProviderFatal(detail.clone()),
        }
    }

    /// Advisory to show the user, if this error warrants one
    pub fn advisory(&self) -> Option<Advisory> {
        match self {
            TrackerError::ServiceUnavailable => Some(Advisory::ServicesDisabled),
            TrackerError::AuthorizationDenied | TrackerError::AuthorizationRestricted => {
                Some(Advisory::AuthorizationFailed)
            }
            TrackerError::ProviderTransient(_) => Some(Advisory::NetworkIssue),
            _ => None,
        }
    }
}

impl From<HostError> for TrackerError {
    fn from(error: HostError) -> Self {
        match error {
            HostError::Transport { message } => TrackerError::ProviderTransient(message),
            other => TrackerError::ProviderFatal(other.to_string()),
        }
    }
}
