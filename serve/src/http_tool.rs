//! Custom HTTP tools (spec §6.2): definitions stored via REST and registered
//! as live `Tool` executors that issue the configured HTTP request at call
//! time.

use std::sync::Arc;

use async_trait::async_trait;
use orchestrator_core::{ToolCallContent, ToolCallContext, ToolRegistry, ToolSourceError, ToolSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpToolDefinition {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "companyId")]
    pub company_id: String,
    pub name: String,
    pub description: Option<String>,
    pub method: String,
    pub url: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Live executor for one `HttpToolDefinition`: args become the JSON body on
/// POST/PUT/PATCH, or query parameters on GET/DELETE.
pub struct HttpTool {
    def: HttpToolDefinition,
    client: reqwest::Client,
}

impl HttpTool {
    pub fn new(def: HttpToolDefinition, client: reqwest::Client) -> Self {
        Self { def, client }
    }
}

#[async_trait]
impl orchestrator_core::Tool for HttpTool {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.def.name.clone(),
            description: self.def.description.clone(),
            input_schema: self.def.input_schema.clone(),
        }
    }

    async fn call(
        &self,
        args: Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let method = self
            .def
            .method
            .parse::<reqwest::Method>()
            .map_err(|e| ToolSourceError::InvalidInput(format!("invalid HTTP method: {e}")))?;

        let mut request = self.client.request(method.clone(), &self.def.url);
        request = if matches!(method, reqwest::Method::GET | reqwest::Method::DELETE) {
            request.query(&flatten_query(&args))
        } else {
            request.json(&args)
        };

        let response = request
            .send()
            .await
            .map_err(|e| ToolSourceError::Transport(format!("http tool request failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolSourceError::Transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(ToolSourceError::Executor(format!(
                "http tool {} returned {}: {}",
                self.def.name, status, body
            )));
        }
        Ok(ToolCallContent { text: body })
    }
}

fn flatten_query(args: &Value) -> Vec<(String, String)> {
    args.as_object()
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| {
                    let value = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Registers `def` as a live tool on `registry`, replacing any prior
/// registration with the same name.
pub async fn register_http_tool(
    registry: &Arc<ToolRegistry>,
    client: reqwest::Client,
    def: HttpToolDefinition,
) -> Result<(), ToolSourceError> {
    registry.unregister(&def.name).await;
    registry.register(Arc::new(HttpTool::new(def, client))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_query_stringifies_non_string_values() {
        let pairs = flatten_query(&json!({"q": "rust", "limit": 5}));
        assert!(pairs.contains(&("q".to_string(), "rust".to_string())));
        assert!(pairs.contains(&("limit".to_string(), "5".to_string())));
    }
}
