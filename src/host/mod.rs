//! Host collaborator boundary
//!
//! Everything the tracker consumes from its environment goes through the
//! traits in this module: the location provider, the execution-budget API
//! that keeps the process alive in the background, and the upload transport.
//! In-memory implementations live in [`mock`] for tests and simulations.

pub mod provider;
pub mod budget;
pub mod upload;
pub mod mock;
pub mod error;

pub use provider::{AccuracyMode, AuthorizationStatus, DistanceFilter, LocationProvider, ProviderErrorKind};
pub use budget::{BudgetToken, ExecutionBudgetHost, ExpirationHandler};
pub use upload::UploadTransport;
pub use mock::{MockBudgetHost, MockLocationProvider, ProviderCall, RecordingUploader};
pub use error::{HostError, HostResult};
