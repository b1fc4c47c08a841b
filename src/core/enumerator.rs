use async_trait::async_trait;

use super::error::EnumerationError;
use super::models::DeviceDescriptor;

/// Discovers the physical storage devices currently attached.
#[async_trait]
pub trait DeviceEnumerator: Send + Sync {
    /// List all currently attached devices, in presentation order.
    ///
    /// Each call produces a complete listing; callers replace their previous
    /// set wholesale.
    async fn refresh(&self) -> Result<Vec<DeviceDescriptor>, EnumerationError>;
}
