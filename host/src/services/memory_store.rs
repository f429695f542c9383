//! Memories kept in memory, searched by case-insensitive substring

use async_trait::async_trait;
use bus::MemoryService;
use chrono::Utc;
use serde_json::{Value, json};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Memory {
    id: String,
    content: String,
    category: String,
    importance: i64,
    created_at: String,
}

impl Memory {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "content": self.content,
            "category": self.category,
            "importance": self.importance,
            "createdAt": self.created_at,
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMemoryService {
    memories: RwLock<Vec<Memory>>,
}

impl InMemoryMemoryService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryService for InMemoryMemoryService {
    async fn save_memory(&self, content: String, category: String, importance: i64) -> anyhow::Result<Value> {
        if !(1..=10).contains(&importance) {
            anyhow::bail!("importance must be between 1 and 10, got {importance}");
        }

        let memory = Memory {
            id: format!("mem_{}", uuid::Uuid::new_v4().simple()),
            content,
            category,
            importance,
            created_at: Utc::now().to_rfc3339(),
        };
        let json = memory.to_json();
        self.memories.write().await.push(memory);
        Ok(json)
    }

    /// Most important matches first
    async fn search_memories(&self, query: String, limit: u64) -> anyhow::Result<Vec<Value>> {
        let needle = query.to_lowercase();
        let memories = self.memories.read().await;

        let mut matches: Vec<&Memory> = memories
            .iter()
            .filter(|memory| memory.content.to_lowercase().contains(&needle))
            .collect();
        matches.sort_by(|a, b| b.importance.cmp(&a.importance));

        Ok(matches
            .into_iter()
            .take(limit as usize)
            .map(Memory::to_json)
            .collect())
    }

    async fn delete_memory(&self, memory_id: String) -> anyhow::Result<bool> {
        let mut memories = self.memories.write().await;
        let before = memories.len();
        memories.retain(|memory| memory.id != memory_id);
        Ok(memories.len() != before)
    }
}
