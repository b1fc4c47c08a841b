use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::adapters;
use crate::config::AppConfig;
use crate::core::{Controller, ControllerHandle, DeviceEnumerator, EraseBackend};

/// Everything a front end needs to drive an erase workflow.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub enumerator: Arc<dyn DeviceEnumerator>,
    pub backend: Arc<dyn EraseBackend>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        let (enumerator, backend) = adapters::get_adapters(&config);
        Self::with_adapters(config, enumerator, backend)
    }

    pub fn with_adapters(
        config: AppConfig,
        enumerator: Arc<dyn DeviceEnumerator>,
        backend: Arc<dyn EraseBackend>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            enumerator,
            backend,
        }
    }

    /// Spawn a controller on the current runtime. It stops once every clone of
    /// the returned handle is dropped.
    pub fn start_controller(&self) -> (ControllerHandle, JoinHandle<()>) {
        let (controller, handle) = Controller::new(self.enumerator.clone(), self.backend.clone());
        let task = tokio::spawn(controller.run());
        (handle, task)
    }
}
