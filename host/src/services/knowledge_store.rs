//! Knowledge bases kept in memory for the lifetime of the host

use std::collections::BTreeMap;

use async_trait::async_trait;
use bus::KnowledgeService;
use chrono::Utc;
use serde_json::{Value, json};
use shared::{Component, component_info};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryKnowledgeService {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryKnowledgeService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KnowledgeService for InMemoryKnowledgeService {
    async fn create_knowledge(&self, name: String, description: String, embedding_model: String) -> anyhow::Result<Value> {
        if name.trim().is_empty() {
            anyhow::bail!("knowledge base name must not be empty");
        }

        let id = format!("kb_{}", uuid::Uuid::new_v4().simple());
        let entry = json!({
            "id": id,
            "name": name,
            "description": description,
            "embeddingModel": embedding_model,
            "createdAt": Utc::now().to_rfc3339(),
        });

        self.entries.write().await.insert(id.clone(), entry.clone());
        component_info!(Component::Host, "📚 Created knowledge base {}", id);
        Ok(entry)
    }

    async fn list_knowledge(&self) -> anyhow::Result<Vec<Value>> {
        Ok(self.entries.read().await.values().cloned().collect())
    }

    async fn get_knowledge(&self, knowledge_id: String) -> anyhow::Result<Option<Value>> {
        Ok(self.entries.read().await.get(&knowledge_id).cloned())
    }

    async fn delete_knowledge(&self, knowledge_id: String) -> anyhow::Result<bool> {
        Ok(self.entries.write().await.remove(&knowledge_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_get_delete() {
        let service = InMemoryKnowledgeService::new();

        let created = service
            .create_knowledge("Docs".into(), "".into(), "default".into())
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        assert_eq!(service.list_knowledge().await.unwrap().len(), 1);
        assert_eq!(service.get_knowledge(id.clone()).await.unwrap().unwrap()["name"], "Docs");

        assert!(service.delete_knowledge(id.clone()).await.unwrap());
        assert!(!service.delete_knowledge(id.clone()).await.unwrap());
        assert!(service.get_knowledge(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let service = InMemoryKnowledgeService::new();
        assert!(service.create_knowledge("  ".into(), "".into(), "default".into()).await.is_err());
    }
}
