//! Worker process supervisor
//!
//! Spawns the companion worker, captures its output into a bounded log buffer,
//! restarts it after unexpected exits within a budget, and polls the OS process
//! table so a missed exit event never leaves the status stale.

pub mod config;
pub mod error;
pub mod interpreter;
pub mod log_buffer;
pub mod services;
pub mod supervisor;
pub mod traits;

// Re-export commonly used types
pub use config::{ServiceConfig, SupervisorSettings};
pub use error::{SupervisorError, SupervisorResult};
pub use log_buffer::LogBuffer;
pub use services::SysinfoProbe;
pub use supervisor::{ProcessSupervisor, StartedProcess, SupervisorEvent};
pub use traits::ProcessProbe;
