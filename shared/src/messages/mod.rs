//! Message types exchanged over the socket bus
//!
//! - `envelope`: the typed, timestamped unit every peer sends and receives
//! - `bridge`: descriptors and results for the reverse-RPC bridge

pub mod bridge;
pub mod envelope;

pub use bridge::{BridgeCallResult, BridgeMethodDescriptor, CallStyle, ParamDescriptor, ParamType};
pub use envelope::{MessageEnvelope, MessageKind, now_millis};
