mod erase;
mod lsblk;

pub use erase::{EraseMethod, Pattern, pass_patterns};
pub use lsblk::{classify, parse_lsblk};

use async_trait::async_trait;
use nix::unistd::Uid;
use tokio::process::Command;
use tracing::{Instrument, debug, error, info, info_span};

use crate::config::EraseConfig;
use crate::core::{
    DeviceDescriptor, DeviceEnumerator, DeviceSet, EnumerationError, EraseBackend, ErasureError,
};
use erase::DeviceEraser;
use lsblk::LSBLK_COLUMNS;

/// Lists whole disks through `lsblk`.
#[derive(Debug, Default, Clone)]
pub struct LsblkEnumerator;

#[async_trait]
impl DeviceEnumerator for LsblkEnumerator {
    async fn refresh(&self) -> Result<Vec<DeviceDescriptor>, EnumerationError> {
        let output = Command::new("lsblk")
            .args(["-d", "-J", "-o", LSBLK_COLUMNS])
            .output()
            .await
            .map_err(|e| EnumerationError::Spawn {
                program: "lsblk",
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(EnumerationError::CommandFailed {
                program: "lsblk",
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let devices = parse_lsblk(&String::from_utf8_lossy(&output.stdout))?;
        debug!(count = devices.len(), "lsblk listed devices");
        Ok(devices)
    }
}

/// Erases devices with dd, hdparm or nvme-cli depending on the media.
///
/// Requires root. Devices are erased one after another; a failure on one
/// device does not stop the others, but fails the episode as a whole.
pub struct LinuxEraseBackend {
    enumerator: LsblkEnumerator,
    config: EraseConfig,
}

impl LinuxEraseBackend {
    pub fn new(config: EraseConfig) -> Self {
        Self {
            enumerator: LsblkEnumerator,
            config,
        }
    }
}

#[async_trait]
impl EraseBackend for LinuxEraseBackend {
    async fn erase(&self, devices: &DeviceSet) -> Result<String, ErasureError> {
        if !Uid::effective().is_root() {
            return Err(ErasureError::NotPrivileged);
        }

        let attached = self
            .enumerator
            .refresh()
            .await
            .map_err(|e| ErasureError::Failed(format!("Could not re-read devices: {e}")))?;

        let mut targets = Vec::with_capacity(devices.len());
        for name in devices.iter() {
            match attached.iter().find(|d| d.device_name == name) {
                Some(device) => targets.push(device),
                None => return Err(ErasureError::UnknownDevice(name.to_string())),
            }
        }

        let mut failures = Vec::new();
        for device in targets {
            let method = EraseMethod::for_device(device, self.config.passes);
            let eraser = DeviceEraser {
                device,
                config: &self.config,
            };
            let span = info_span!("erase_device", device = %device.device_name);

            match eraser.run(method).instrument(span).await {
                Ok(()) => info!(device = %device.device_name, "Device erased"),
                Err(e) => {
                    error!(device = %device.device_name, error = %format!("{e:#}"), "Device erase failed");
                    failures.push(format!("{}: {e:#}", device.device_name));
                }
            }
        }

        if failures.is_empty() {
            Ok(format!("Erase completed: {devices}"))
        } else {
            Err(ErasureError::Failed(format!(
                "Erase failed on {}",
                failures.join("; ")
            )))
        }
    }
}
