//! Supervisor-specific error types

use shared::ServiceStatus;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Worker is already running (status: {status})")]
    AlreadyRunning { status: ServiceStatus },

    #[error("Failed to spawn worker with {interpreter}: {source}")]
    SpawnFailed {
        interpreter: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to provision worker script at {path}: {source}")]
    ScriptProvisionFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No worker configuration available to restart with")]
    MissingConfig,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type SupervisorResult<T> = Result<T, SupervisorError>;
