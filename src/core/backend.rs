use async_trait::async_trait;

use super::error::ErasureError;
use super::models::DeviceSet;

/// Privileged collaborator that irreversibly destroys the data on devices.
#[async_trait]
pub trait EraseBackend: Send + Sync {
    /// Erase every device in `devices`, choosing the method per device type.
    ///
    /// Returns a human-readable completion message. This is a single
    /// long-running call with no progress reporting and no cancellation.
    async fn erase(&self, devices: &DeviceSet) -> Result<String, ErasureError>;
}
