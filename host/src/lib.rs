//! Desktop host process
//!
//! Supervises the companion worker, runs the local message bus and relays
//! traffic between the worker and UI peers.

pub mod app;
pub mod config;
pub mod router;
pub mod services;

pub use app::{HostApp, HostSettings};
pub use config::Args;
