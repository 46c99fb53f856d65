//! Upload transport interface

use crate::core::Fix;
use crate::host::HostResult;
use async_trait::async_trait;

/// Sends the fix chosen for a cycle to the backend.
///
/// `None` means no fix was available this cycle; transports decide whether
/// that is worth reporting. Retries are the transport's concern.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn upload(&self, fix: Option<Fix>) -> HostResult<()>;
}
