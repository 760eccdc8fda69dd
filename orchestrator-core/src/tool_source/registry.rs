//! `ToolRegistry` (spec §4.1): canonical name → executor map with stable
//! insertion order, schema validation at the call boundary, and per-call
//! deadlines.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::timeout;

use crate::error::{ErrorKind, HasErrorKind};
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError, ToolSpec};
use crate::tools::Tool;

const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ToolRegistryError {
    #[error(transparent)]
    Tool(#[from] ToolSourceError),
}

impl HasErrorKind for ToolRegistryError {
    fn kind(&self) -> ErrorKind {
        match self {
            ToolRegistryError::Tool(e) => e.kind(),
        }
    }
}

struct Entry {
    tool: Arc<dyn Tool>,
    deadline: Duration,
}

/// Read-heavy, concurrency-safe name → executor map. Writes (register/
/// unregister) happen at startup and during explicit server add/remove;
/// reads (lookup/describeAll/invoke) happen on every dispatch (spec §5).
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    order: Vec<String>,
    entries: HashMap<String, Entry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tool`, failing with `DuplicateName` if the name exists, or
    /// `InvalidSchema` if `spec().input_schema` isn't a well-formed object
    /// schema. Re-registration after `unregister` is a fresh insertion and
    /// takes a new position at the end of `describeAll()`'s order.
    pub async fn register(&self, tool: Arc<dyn Tool>) -> Result<(), ToolSourceError> {
        self.register_with_deadline(tool, DEFAULT_DEADLINE).await
    }

    pub async fn register_with_deadline(
        &self,
        tool: Arc<dyn Tool>,
        deadline: Duration,
    ) -> Result<(), ToolSourceError> {
        let spec = tool.spec();
        validate_schema(&spec.input_schema)
            .map_err(|reason| ToolSourceError::InvalidSchema(reason))?;

        let mut inner = self.inner.write().await;
        if inner.entries.contains_key(&spec.name) {
            return Err(ToolSourceError::DuplicateName(spec.name));
        }
        inner.order.push(spec.name.clone());
        inner.entries.insert(spec.name, Entry { tool, deadline });
        Ok(())
    }

    /// Idempotent: removing an absent name is not an error.
    pub async fn unregister(&self, name: &str) {
        let mut inner = self.inner.write().await;
        inner.entries.remove(name);
        inner.order.retain(|n| n != name);
    }

    pub async fn lookup(&self, name: &str) -> Result<Arc<dyn Tool>, ToolSourceError> {
        let inner = self.inner.read().await;
        inner
            .entries
            .get(name)
            .map(|e| e.tool.clone())
            .ok_or_else(|| ToolSourceError::NotFound(name.to_string()))
    }

    /// Descriptors in stable insertion order (re-registered tools keep their
    /// original position).
    pub async fn describe_all(&self) -> Vec<ToolSpec> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|name| inner.entries.get(name).map(|e| e.tool.spec()))
            .collect()
    }

    /// Validates `args` against the tool's schema, then calls the executor
    /// under its configured deadline (default 30s), wrapping a deadline trip
    /// as `Timeout`.
    pub async fn invoke(
        &self,
        name: &str,
        args: Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let (tool, deadline) = {
            let inner = self.inner.read().await;
            let entry = inner
                .entries
                .get(name)
                .ok_or_else(|| ToolSourceError::NotFound(name.to_string()))?;
            (entry.tool.clone(), entry.deadline)
        };

        let spec = tool.spec();
        validate_args(&spec.input_schema, &args)?;

        let cancelled = ctx.map(|c| c.cancellation.clone()).unwrap_or_default();
        tokio::select! {
            biased;
            _ = cancelled.cancelled() => Err(ToolSourceError::Cancelled),
            result = timeout(deadline, tool.call(args, ctx)) => match result {
                Ok(result) => result,
                Err(_) => Err(ToolSourceError::Timeout),
            },
        }
    }
}

/// Minimal structural check: the schema must be a JSON object and, when it
/// declares `type`, that type must be `"object"` (every built-in tool here
/// takes a keyword-argument object).
fn validate_schema(schema: &Value) -> Result<(), String> {
    let obj = schema
        .as_object()
        .ok_or_else(|| "schema must be a JSON object".to_string())?;
    if let Some(ty) = obj.get("type").and_then(|v| v.as_str()) {
        if ty != "object" {
            return Err(format!("schema type must be \"object\", got {ty:?}"));
        }
    }
    Ok(())
}

/// Validates `args` has every field listed in the schema's `required` array.
/// Deliberately shallow (no type/format checking beyond presence) — enough to
/// satisfy spec §4.1's `SchemaError` contract ("offending field and reason")
/// without reimplementing a JSON Schema validator.
fn validate_args(schema: &Value, args: &Value) -> Result<(), ToolSourceError> {
    let Some(required) = schema.get("required").and_then(|v| v.as_array()) else {
        return Ok(());
    };
    let obj = args.as_object();
    for field in required {
        let Some(field) = field.as_str() else { continue };
        let present = obj.map(|o| o.contains_key(field)).unwrap_or(false);
        if !present {
            return Err(ToolSourceError::SchemaError {
                field: field.to_string(),
                reason: "required field missing".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "echo".to_string(),
                description: Some("echoes input".to_string()),
                input_schema: json!({"type": "object", "required": ["text"]}),
            }
        }
        async fn call(
            &self,
            args: Value,
            _ctx: Option<&ToolCallContext>,
        ) -> Result<ToolCallContent, ToolSourceError> {
            Ok(ToolCallContent {
                text: args.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            })
        }
    }

    #[tokio::test]
    async fn duplicate_name_rejected() {
        let reg = ToolRegistry::new();
        reg.register(Arc::new(Echo)).await.unwrap();
        let err = reg.register(Arc::new(Echo)).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn lookup_missing_is_not_found() {
        let reg = ToolRegistry::new();
        let err = reg.lookup("nope").await.unwrap_err();
        assert!(matches!(err, ToolSourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn register_unregister_returns_lookup_to_not_found() {
        let reg = ToolRegistry::new();
        reg.register(Arc::new(Echo)).await.unwrap();
        reg.unregister("echo").await;
        assert!(reg.lookup("echo").await.is_err());
    }

    #[tokio::test]
    async fn invoke_validates_required_fields() {
        let reg = ToolRegistry::new();
        reg.register(Arc::new(Echo)).await.unwrap();
        let err = reg.invoke("echo", json!({}), None).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::SchemaError { .. }));
    }

    #[tokio::test]
    async fn invoke_calls_executor() {
        let reg = ToolRegistry::new();
        reg.register(Arc::new(Echo)).await.unwrap();
        let out = reg
            .invoke("echo", json!({"text": "hi"}), None)
            .await
            .unwrap();
        assert_eq!(out.text, "hi");
    }

    #[tokio::test]
    async fn describe_all_is_stable_insertion_order() {
        struct Named(&'static str);
        #[async_trait]
        impl Tool for Named {
            fn name(&self) -> &str {
                self.0
            }
            fn spec(&self) -> ToolSpec {
                ToolSpec {
                    name: self.0.to_string(),
                    description: None,
                    input_schema: json!({"type": "object"}),
                }
            }
            async fn call(
                &self,
                _args: Value,
                _ctx: Option<&ToolCallContext>,
            ) -> Result<ToolCallContent, ToolSourceError> {
                Ok(ToolCallContent { text: String::new() })
            }
        }

        let reg = ToolRegistry::new();
        reg.register(Arc::new(Named("a"))).await.unwrap();
        reg.register(Arc::new(Named("b"))).await.unwrap();
        reg.unregister("a").await;
        reg.register(Arc::new(Named("a"))).await.unwrap();

        let names: Vec<String> = reg.describe_all().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
