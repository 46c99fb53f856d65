//! Location provider interface

use crate::host::HostResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Desired accuracy of the underlying positioning hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccuracyMode {
    /// Highest accuracy the device offers
    Best,
    /// Kilometer-scale accuracy, cheapest on power
    Coarse,
}

/// Minimum movement before the provider reports a new fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DistanceFilter {
    /// Report every update
    None,
    Meters(f64),
}

/// Authorization state as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    NotDetermined,
    Restricted,
    Denied,
    AuthorizedWhenInUse,
    AuthorizedAlways,
}

impl AuthorizationStatus {
    pub fn is_blocked(&self) -> bool {
        matches!(self, AuthorizationStatus::Denied | AuthorizationStatus::Restricted)
    }
}

/// Classification of asynchronous provider failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderErrorKind {
    /// Connectivity problem while resolving a position
    Network,
    /// The user revoked or never granted access
    Denied,
    Other(String),
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::Network => write!(f, "network"),
            ProviderErrorKind::Denied => write!(f, "denied"),
            ProviderErrorKind::Other(detail) => write!(f, "other: {}", detail),
        }
    }
}

/// Facade over the platform location service.
///
/// All calls must return promptly; fixes and errors come back
/// asynchronously through the scheduler handle, not through this trait.
pub trait LocationProvider: Send + Sync {
    /// Whether location services are enabled device-wide
    fn services_enabled(&self) -> bool;

    /// Current authorization for this process
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Prompt for authorization; the answer arrives out of band
    fn request_authorization(&self);

    fn set_accuracy_mode(&self, mode: AccuracyMode);

    fn set_distance_filter(&self, filter: DistanceFilter);

    /// Begin delivering fixes
    fn start_sampling(&self) -> HostResult<()>;

    /// Stop delivering fixes
    fn stop_sampling(&self) -> HostResult<()>;
}
