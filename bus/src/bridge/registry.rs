//! Allow-listed dispatch table for bridge calls

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;
use shared::{BridgeCallResult, BridgeMethodDescriptor, Component, component_debug, component_warn};

use super::params::transform_params;

/// Handler invoked with the transformed argument list
pub type BridgeHandler = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

#[derive(Clone)]
struct RegisteredMethod {
    descriptor: BridgeMethodDescriptor,
    handler: BridgeHandler,
}

/// Collects descriptors and their handlers before freezing them
#[derive(Default)]
pub struct BridgeRegistryBuilder {
    services: BTreeMap<String, BTreeMap<String, RegisteredMethod>>,
}

impl BridgeRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one callable method; a later registration of the same pair replaces the earlier one
    pub fn register<F, Fut>(mut self, descriptor: BridgeMethodDescriptor, handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let handler: BridgeHandler = Arc::new(move |args| handler(args).boxed());
        self.services
            .entry(descriptor.service.clone())
            .or_default()
            .insert(descriptor.method.clone(), RegisteredMethod { descriptor, handler });
        self
    }

    pub fn build(self) -> BridgeRegistry {
        BridgeRegistry { services: self.services }
    }
}

/// Immutable catalog of remotely callable host methods
///
/// The catalog is the dispatch table: a `(service, method)` pair that was not
/// registered has no handler and cannot be reached.
#[derive(Clone, Default)]
pub struct BridgeRegistry {
    services: BTreeMap<String, BTreeMap<String, RegisteredMethod>>,
}

impl BridgeRegistry {
    pub fn builder() -> BridgeRegistryBuilder {
        BridgeRegistryBuilder::new()
    }

    /// Validate, transform and invoke; every failure comes back as a value
    pub async fn execute(&self, service: &str, method: &str, params: Value) -> BridgeCallResult {
        let Some(methods) = self.services.get(service) else {
            let available = self.services.keys().cloned().collect::<Vec<_>>().join(", ");
            component_warn!(Component::Bridge, "🚫 Unknown bridge service '{}'", service);
            return BridgeCallResult::err(format!(
                "Unknown service '{service}'. Available services: {available}"
            ));
        };

        let Some(registered) = methods.get(method) else {
            let available = methods.keys().cloned().collect::<Vec<_>>().join(", ");
            component_warn!(Component::Bridge, "🚫 Rejected unregistered method {}.{}", service, method);
            return BridgeCallResult::err(format!(
                "Method '{method}' is not registered on service '{service}'. Available methods: {available}"
            ));
        };

        let args = match transform_params(&registered.descriptor, &params) {
            Ok(args) => args,
            Err(message) => return BridgeCallResult::err(message),
        };

        component_debug!(Component::Bridge, "Invoking {}.{} with {} args", service, method, args.len());

        match AssertUnwindSafe((registered.handler)(args)).catch_unwind().await {
            Ok(Ok(result)) => BridgeCallResult::ok(result),
            Ok(Err(e)) => {
                component_warn!(Component::Bridge, "⚠️ {}.{} failed: {:#}", service, method, e);
                BridgeCallResult::err(format!("{e:#}"))
            }
            Err(_) => {
                component_warn!(Component::Bridge, "💥 {}.{} panicked", service, method);
                BridgeCallResult::err(format!("{service}.{method} panicked"))
            }
        }
    }

    /// Descriptors of every registered method, optionally for one service
    pub fn list_methods(&self, service: Option<&str>) -> Vec<BridgeMethodDescriptor> {
        self.services
            .iter()
            .filter(|(name, _)| service.is_none_or(|wanted| wanted == name.as_str()))
            .flat_map(|(_, methods)| methods.values().map(|m| m.descriptor.clone()))
            .collect()
    }

    pub fn services(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    pub fn contains(&self, service: &str, method: &str) -> bool {
        self.services.get(service).is_some_and(|methods| methods.contains_key(method))
    }

    pub fn method_count(&self) -> usize {
        self.services.values().map(|methods| methods.len()).sum()
    }

    /// Markdown description of the callable surface, for prompts and docs
    pub fn capability_prompt(&self) -> String {
        let mut out = String::from("## Host services\n\nCall these through FRONTEND_BRIDGE_REQUEST.\n");

        for (service, methods) in &self.services {
            out.push_str(&format!("\n### {service}\n\n"));
            for registered in methods.values() {
                let descriptor = &registered.descriptor;
                let params = descriptor
                    .params
                    .iter()
                    .map(|p| {
                        let marker = if p.required { "" } else { "?" };
                        match &p.default {
                            Some(default) => format!("{}{}: {} = {}", p.name, marker, p.param_type, default),
                            None => format!("{}{}: {}", p.name, marker, p.param_type),
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ");

                out.push_str(&format!("- `{}({})`: {}", descriptor.method, params, descriptor.description));
                if !descriptor.returns.is_empty() {
                    out.push_str(&format!(" Returns {}.", descriptor.returns));
                }
                out.push('\n');
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::{ParamDescriptor, ParamType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn explode() -> Value {
        panic!("handler exploded")
    }

    fn echo_registry(calls: Arc<AtomicUsize>) -> BridgeRegistry {
        BridgeRegistry::builder()
            .register(
                BridgeMethodDescriptor::new("echoService", "echo", "Echo the input")
                    .param(ParamDescriptor::required("text", ParamType::String, "Text to echo"))
                    .returns("the same text"),
                move |args| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(args[0].clone())
                    }
                },
            )
            .register(
                BridgeMethodDescriptor::new("echoService", "fail", "Always fails"),
                |_| async { Err(anyhow::anyhow!("backend unavailable")) },
            )
            .register(
                BridgeMethodDescriptor::new("echoService", "explode", "Panics"),
                |_| async { Ok(explode()) },
            )
            .build()
    }

    #[tokio::test]
    async fn test_registered_method_is_invoked() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = echo_registry(calls.clone());

        let result = registry.execute("echoService", "echo", json!({"text": "hi"})).await;

        assert_eq!(result, BridgeCallResult::ok(json!("hi")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_service_lists_available() {
        let registry = echo_registry(Arc::new(AtomicUsize::new(0)));
        let result = registry.execute("fileService", "read", Value::Null).await;

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("Unknown service 'fileService'"));
        assert!(error.contains("echoService"));
    }

    #[tokio::test]
    async fn test_unregistered_method_never_reaches_a_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = echo_registry(calls.clone());

        for method in ["__proto__", "constructor", "toString", "Echo"] {
            let result = registry.execute("echoService", method, json!({"text": "hi"})).await;
            assert!(!result.success);
            assert!(result.error.unwrap().contains("not registered"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_error_becomes_failure_result() {
        let registry = echo_registry(Arc::new(AtomicUsize::new(0)));
        let result = registry.execute("echoService", "fail", Value::Null).await;

        assert_eq!(result, BridgeCallResult::err("backend unavailable"));
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_failure_result() {
        let registry = echo_registry(Arc::new(AtomicUsize::new(0)));
        let result = registry.execute("echoService", "explode", Value::Null).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("panicked"));
    }

    #[tokio::test]
    async fn test_invalid_params_do_not_invoke() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = echo_registry(calls.clone());

        let result = registry.execute("echoService", "echo", json!({"text": 42})).await;

        assert!(!result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listing_and_prompt() {
        let registry = echo_registry(Arc::new(AtomicUsize::new(0)));

        assert_eq!(registry.method_count(), 3);
        assert_eq!(registry.list_methods(Some("echoService")).len(), 3);
        assert!(registry.list_methods(Some("other")).is_empty());
        assert!(registry.contains("echoService", "echo"));
        assert!(!registry.contains("echoService", "__proto__"));

        let prompt = registry.capability_prompt();
        assert!(prompt.contains("### echoService"));
        assert!(prompt.contains("- `echo(text: string)`: Echo the input Returns the same text."));
    }
}
