//! Local messaging bus
//!
//! WebSocket server shared by the UI and the supervised worker: connection
//! acknowledgement, broadcast and targeted delivery, heartbeat eviction of
//! half-open peers, and the allow-listed bridge through which the worker calls
//! back into host services.

pub mod bridge;
pub mod error;
pub mod services;
pub mod state;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use bridge::{BridgeRegistry, BridgeRegistryBuilder, standard_catalog};
pub use error::{BusError, BusResult};
pub use services::MessageBus;
pub use traits::{KnowledgeService, MemoryService};
pub use types::{BusAddress, BusConfig, ClientInfo, InboundMessage};
