//! Service implementations
//!
//! Real implementations of the supervisor's traits.

pub mod process_probe;

pub use process_probe::SysinfoProbe;
