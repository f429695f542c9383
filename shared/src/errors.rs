//! Shared error types for the worker host

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Serialization failed: {message}")]
    SerializationError { message: String },

    #[error("Deserialization failed: {message}")]
    DeserializationError { message: String },

    #[error("HTTP client error: {message}")]
    HttpClientError { message: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
