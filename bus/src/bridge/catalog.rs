//! Standard catalog of host methods reachable from the worker

use std::sync::Arc;

use anyhow::{Context, anyhow};
use serde_json::{Value, json};
use shared::{BridgeMethodDescriptor, ParamDescriptor, ParamType};

use super::registry::{BridgeRegistry, BridgeRegistryBuilder};
use crate::traits::{KnowledgeService, MemoryService};

pub const KNOWLEDGE_SERVICE: &str = "knowledgeService";
pub const MEMORY_SERVICE: &str = "memoryService";

/// Build the registry exposing knowledge and memory operations
pub fn standard_catalog(knowledge: Arc<dyn KnowledgeService>, memory: Arc<dyn MemoryService>) -> BridgeRegistry {
    let builder = register_knowledge(BridgeRegistry::builder(), knowledge);
    register_memory(builder, memory).build()
}

fn register_knowledge(builder: BridgeRegistryBuilder, service: Arc<dyn KnowledgeService>) -> BridgeRegistryBuilder {
    let create = service.clone();
    let list = service.clone();
    let get = service.clone();
    let delete = service;

    builder
        .register(
            BridgeMethodDescriptor::new(KNOWLEDGE_SERVICE, "createKnowledge", "Create a knowledge base")
                .param(ParamDescriptor::required("name", ParamType::String, "Display name"))
                .param(
                    ParamDescriptor::optional("description", ParamType::String, "What the knowledge base holds")
                        .with_default(json!("")),
                )
                .param(
                    ParamDescriptor::optional("embeddingModel", ParamType::String, "Embedding model id")
                        .with_default(json!("default")),
                )
                .returns("the created knowledge base")
                .structured(),
            move |args| {
                let service = create.clone();
                async move {
                    let payload = args.into_iter().next().unwrap_or(Value::Null);
                    let name = field(&payload, "name")?;
                    let description = field(&payload, "description")?;
                    let model = field(&payload, "embeddingModel")?;
                    service.create_knowledge(name, description, model).await
                }
            },
        )
        .register(
            BridgeMethodDescriptor::new(KNOWLEDGE_SERVICE, "listKnowledge", "List all knowledge bases")
                .returns("an array of knowledge bases"),
            move |_| {
                let service = list.clone();
                async move { Ok(Value::Array(service.list_knowledge().await?)) }
            },
        )
        .register(
            BridgeMethodDescriptor::new(KNOWLEDGE_SERVICE, "getKnowledge", "Fetch one knowledge base")
                .param(ParamDescriptor::required("knowledgeId", ParamType::String, "Knowledge base id"))
                .returns("the knowledge base or null"),
            move |args| {
                let service = get.clone();
                async move {
                    let id = string_arg(&args, 0)?;
                    Ok(service.get_knowledge(id).await?.unwrap_or(Value::Null))
                }
            },
        )
        .register(
            BridgeMethodDescriptor::new(KNOWLEDGE_SERVICE, "deleteKnowledge", "Delete a knowledge base")
                .param(ParamDescriptor::required("knowledgeId", ParamType::String, "Knowledge base id"))
                .returns("true when something was deleted"),
            move |args| {
                let service = delete.clone();
                async move {
                    let id = string_arg(&args, 0)?;
                    Ok(json!(service.delete_knowledge(id).await?))
                }
            },
        )
}

fn register_memory(builder: BridgeRegistryBuilder, service: Arc<dyn MemoryService>) -> BridgeRegistryBuilder {
    let save = service.clone();
    let search = service.clone();
    let delete = service;

    builder
        .register(
            BridgeMethodDescriptor::new(MEMORY_SERVICE, "saveMemory", "Store a long-term memory")
                .param(ParamDescriptor::required("content", ParamType::String, "Memory text"))
                .param(ParamDescriptor::optional("category", ParamType::String, "Grouping").with_default(json!("general")))
                .param(ParamDescriptor::optional("importance", ParamType::Integer, "1 to 10").with_default(json!(5)))
                .returns("the stored memory"),
            move |args| {
                let service = save.clone();
                async move {
                    let content = string_arg(&args, 0)?;
                    let category = string_arg(&args, 1)?;
                    let importance = int_arg(&args, 2)?;
                    service.save_memory(content, category, importance).await
                }
            },
        )
        .register(
            BridgeMethodDescriptor::new(MEMORY_SERVICE, "searchMemories", "Search memories by text")
                .param(ParamDescriptor::required("query", ParamType::String, "Search text"))
                .param(ParamDescriptor::optional("limit", ParamType::Integer, "Max results").with_default(json!(10)))
                .returns("an array of matching memories"),
            move |args| {
                let service = search.clone();
                async move {
                    let query = string_arg(&args, 0)?;
                    let limit = u64::try_from(int_arg(&args, 1)?).context("limit must not be negative")?;
                    Ok(Value::Array(service.search_memories(query, limit).await?))
                }
            },
        )
        .register(
            BridgeMethodDescriptor::new(MEMORY_SERVICE, "deleteMemory", "Delete a memory")
                .param(ParamDescriptor::required("memoryId", ParamType::String, "Memory id"))
                .returns("true when something was deleted"),
            move |args| {
                let service = delete.clone();
                async move {
                    let id = string_arg(&args, 0)?;
                    Ok(json!(service.delete_memory(id).await?))
                }
            },
        )
}

fn string_arg(args: &[Value], index: usize) -> anyhow::Result<String> {
    args.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("argument {index} must be a string"))
}

fn int_arg(args: &[Value], index: usize) -> anyhow::Result<i64> {
    args.get(index)
        .and_then(Value::as_i64)
        .ok_or_else(|| anyhow!("argument {index} must be an integer"))
}

fn field(payload: &Value, name: &str) -> anyhow::Result<String> {
    payload
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("field '{name}' must be a string"))
}
