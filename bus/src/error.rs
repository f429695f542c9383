//! Bus-specific error types

use shared::SharedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Failed to bind message bus on {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type BusResult<T> = Result<T, BusError>;
