use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::core::{
    DeviceDescriptor, DeviceEnumerator, DeviceSet, DeviceType, EnumerationError, EraseBackend,
    ErasureError,
};

/// Shared state behind the simulated enumerator and backend.
#[derive(Default)]
struct SimState {
    devices: Vec<DeviceDescriptor>,
    refresh_calls: usize,
    next_refresh_error: Option<String>,
    erase_delay: Duration,
    erase_error: Option<String>,
    erase_message: Option<String>,
    erase_calls: Vec<DeviceSet>,
}

type Shared = Arc<Mutex<SimState>>;

fn lock(shared: &Shared) -> MutexGuard<'_, SimState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The devices shown when no real hardware is used.
pub fn sample_devices() -> Vec<DeviceDescriptor> {
    vec![
        DeviceDescriptor::new(
            "/dev/sda",
            "Samsung SSD 970 EVO Plus 1TB",
            DeviceType::Ssd,
            "SATA",
        ),
        DeviceDescriptor::new("/dev/sdb", "WD Blue 2TB", DeviceType::Hdd, "SATA"),
        DeviceDescriptor::new(
            "/dev/nvme0n1",
            "Samsung PM9A1 NVMe 512GB",
            DeviceType::Ssd,
            "NVME",
        ),
    ]
}

/// Create a simulated enumerator/backend pair sharing one device list, plus
/// the [`Simulator`] used to steer them.
pub fn simulated(
    devices: Vec<DeviceDescriptor>,
) -> (SimulatedEnumerator, SimulatedEraseBackend, Simulator) {
    let shared: Shared = Arc::new(Mutex::new(SimState {
        devices,
        ..Default::default()
    }));

    (
        SimulatedEnumerator {
            shared: shared.clone(),
        },
        SimulatedEraseBackend {
            shared: shared.clone(),
        },
        Simulator { shared },
    )
}

/// Test and demo control over the simulated hardware.
#[derive(Clone)]
pub struct Simulator {
    shared: Shared,
}

impl Simulator {
    pub fn set_devices(&self, devices: Vec<DeviceDescriptor>) {
        lock(&self.shared).devices = devices;
    }

    pub fn add_device(&self, device: DeviceDescriptor) {
        lock(&self.shared).devices.push(device);
    }

    pub fn remove_device(&self, device_name: &str) {
        lock(&self.shared)
            .devices
            .retain(|d| d.device_name != device_name);
    }

    /// Make the next refresh fail once with `message`.
    pub fn fail_next_refresh(&self, message: impl Into<String>) {
        lock(&self.shared).next_refresh_error = Some(message.into());
    }

    /// Make every erase fail with `message` until cleared.
    pub fn fail_erase(&self, message: impl Into<String>) {
        lock(&self.shared).erase_error = Some(message.into());
    }

    pub fn clear_erase_failure(&self) {
        lock(&self.shared).erase_error = None;
    }

    /// Completion message returned by successful erases.
    pub fn succeed_with(&self, message: impl Into<String>) {
        lock(&self.shared).erase_message = Some(message.into());
    }

    pub fn set_erase_delay(&self, delay: Duration) {
        lock(&self.shared).erase_delay = delay;
    }

    pub fn refresh_count(&self) -> usize {
        lock(&self.shared).refresh_calls
    }

    /// Every device set the backend was asked to erase, in call order.
    pub fn erase_calls(&self) -> Vec<DeviceSet> {
        lock(&self.shared).erase_calls.clone()
    }
}

pub struct SimulatedEnumerator {
    shared: Shared,
}

#[async_trait]
impl DeviceEnumerator for SimulatedEnumerator {
    async fn refresh(&self) -> Result<Vec<DeviceDescriptor>, EnumerationError> {
        let mut state = lock(&self.shared);
        state.refresh_calls += 1;

        if let Some(message) = state.next_refresh_error.take() {
            debug!(error = %message, "(Simulated) Refresh failing on request");
            return Err(EnumerationError::Unavailable(message));
        }

        debug!(count = state.devices.len(), "(Simulated) Listing devices");
        Ok(state.devices.clone())
    }
}

pub struct SimulatedEraseBackend {
    shared: Shared,
}

#[async_trait]
impl EraseBackend for SimulatedEraseBackend {
    async fn erase(&self, devices: &DeviceSet) -> Result<String, ErasureError> {
        let delay = {
            let mut state = lock(&self.shared);
            state.erase_calls.push(devices.clone());
            state.erase_delay
        };

        info!(devices = %devices, delay_ms = delay.as_millis() as u64, "(Simulated) Erasing");
        sleep(delay).await;

        let state = lock(&self.shared);

        if let Some(message) = &state.erase_error {
            return Err(ErasureError::Failed(message.clone()));
        }

        for name in devices.iter() {
            if !state.devices.iter().any(|d| d.device_name == name) {
                return Err(ErasureError::UnknownDevice(name.to_string()));
            }
        }

        Ok(state
            .erase_message
            .clone()
            .unwrap_or_else(|| format!("Erase completed: {devices}")))
    }
}
