//! Service tests for the message bus
//!
//! Connections here are backed by plain channels instead of sockets, so the
//! registry, dispatcher and heartbeat can be driven directly.

pub mod helpers;
pub mod dispatcher;
pub mod heartbeat;
