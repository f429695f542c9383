//! Trait definitions with mockall annotations for testing
//!
//! Domain collaborators reachable from the bridge. The host owns the real
//! implementations; the bus only sees these seams.

use async_trait::async_trait;
use serde_json::Value;

/// Knowledge bases exposed to the worker
#[mockall::automock]
#[async_trait]
pub trait KnowledgeService: Send + Sync {
    async fn create_knowledge(&self, name: String, description: String, embedding_model: String) -> anyhow::Result<Value>;

    async fn list_knowledge(&self) -> anyhow::Result<Vec<Value>>;

    /// `None` when no knowledge base has this id
    async fn get_knowledge(&self, knowledge_id: String) -> anyhow::Result<Option<Value>>;

    /// Whether a knowledge base was removed
    async fn delete_knowledge(&self, knowledge_id: String) -> anyhow::Result<bool>;
}

/// Long-term memories exposed to the worker
#[mockall::automock]
#[async_trait]
pub trait MemoryService: Send + Sync {
    async fn save_memory(&self, content: String, category: String, importance: i64) -> anyhow::Result<Value>;

    async fn search_memories(&self, query: String, limit: u64) -> anyhow::Result<Vec<Value>>;

    async fn delete_memory(&self, memory_id: String) -> anyhow::Result<bool>;
}
