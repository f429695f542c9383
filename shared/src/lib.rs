//! Shared types for the worker host
//!
//! Contains the vocabulary every host subsystem speaks: the socket envelope
//! protocol, bridge descriptors, supervisor status/log types, logging setup and
//! the resilient HTTP client used against the worker's own API.

pub mod errors;
pub mod http_client;
pub mod logging;
pub mod messages;
pub mod types;

pub use errors::*;
pub use types::*;

pub use messages::{
    // Socket envelope protocol
    MessageEnvelope, MessageKind, now_millis,

    // Bridge (reverse RPC) vocabulary
    BridgeCallResult, BridgeMethodDescriptor, CallStyle, ParamDescriptor, ParamType,
};

pub use http_client::{ApiResponse, HttpClient, HttpClientConfig, RequestOptions};
