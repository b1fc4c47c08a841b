pub mod backend;
pub mod controller;
pub mod enumerator;
pub mod error;
pub mod models;
pub mod workflow;

pub use backend::EraseBackend;
pub use controller::{Controller, ControllerHandle};
pub use enumerator::DeviceEnumerator;
pub use error::{EnumerationError, ErasureError, WorkflowError};
pub use models::{
    DeviceDescriptor, DeviceSet, DeviceType, EpisodeId, EpisodeReport, Snapshot, Status,
    WorkflowState,
};
pub use workflow::{Command, Event, Intent, Workflow};
