use thiserror::Error;

use super::models::EpisodeId;

/// Device discovery failed. The previous device list stays valid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnumerationError {
    #[error("failed to run {program}: {reason}")]
    Spawn {
        program: &'static str,
        reason: String,
    },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: &'static str,
        status: String,
        stderr: String,
    },

    #[error("unreadable device listing: {0}")]
    Parse(String),

    #[error("{0}")]
    Unavailable(String),
}

/// The erase backend failed or a device became inaccessible mid-operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErasureError {
    #[error("erasing devices requires root privileges")]
    NotPrivileged,

    #[error("device not found: {0}")]
    UnknownDevice(String),

    #[error("{0}")]
    Failed(String),
}

/// An event the state machine refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("No device selected")]
    SelectionMissing,

    #[error("{0} is not an available device")]
    UnknownDevice(String),

    #[error("{event} is not allowed while {state}")]
    NotAllowed {
        event: &'static str,
        state: &'static str,
    },

    #[error("completion for episode {0} does not match the erase in flight")]
    StaleEpisode(EpisodeId),
}
