//! Reverse RPC from the worker into host services
//!
//! The registry is built once from a catalog of method descriptors, each
//! paired with its handler. Only registered `(service, method)` pairs are
//! reachable; there is no runtime registration.

pub mod catalog;
pub mod params;
pub mod registry;

pub use catalog::{KNOWLEDGE_SERVICE, MEMORY_SERVICE, standard_catalog};
pub use params::transform_params;
pub use registry::{BridgeHandler, BridgeRegistry, BridgeRegistryBuilder};
