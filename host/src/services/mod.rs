//! In-process implementations of the services exposed over the bridge

pub mod knowledge_store;
pub mod memory_store;

pub use knowledge_store::InMemoryKnowledgeService;
pub use memory_store::InMemoryMemoryService;
