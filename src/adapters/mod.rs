use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::AppConfig;
use crate::core::{DeviceEnumerator, EraseBackend};

#[cfg(target_os = "linux")]
pub mod linux;
pub mod simulated;

pub use simulated::{
    SimulatedEnumerator, SimulatedEraseBackend, Simulator, sample_devices, simulated,
};

/// Pick the device enumerator and erase backend for this run.
///
/// Only Linux has a real backend; other platforms always simulate.
pub fn get_adapters(config: &AppConfig) -> (Arc<dyn DeviceEnumerator>, Arc<dyn EraseBackend>) {
    #[cfg(target_os = "linux")]
    if !config.simulation {
        return (
            Arc::new(linux::LsblkEnumerator),
            Arc::new(linux::LinuxEraseBackend::new(config.erase.clone())),
        );
    }

    info!(
        delay_ms = config.simulation_delay_ms,
        "Simulation mode, using sample devices"
    );
    let (enumerator, backend, simulator) = simulated(sample_devices());
    simulator.set_erase_delay(Duration::from_millis(config.simulation_delay_ms));
    (Arc::new(enumerator), Arc::new(backend))
}
