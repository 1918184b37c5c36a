use std::time::Duration;

use async_trait::async_trait;
use matzip_core::config::LlmConfig;
use matzip_core::domain::action::ParamMap;
use matzip_core::SearchError;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use crate::tools;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1000;

/// A tool pick extracted from a model reply, unvalidated: the name may not
/// be a known strategy and the arguments may be incomplete. The resolver
/// decides what to do with it.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: ParamMap,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelReply {
    /// Concatenated text blocks; the model's own account of its pick.
    pub text: Option<String>,
    /// First tool_use block, if any.
    pub invocation: Option<ToolInvocation>,
}

/// Pluggable model seam. Failures surface as
/// [`SearchError::ModelUnavailable`] so the resolver can fall back.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn resolve(&self, prompt: &str) -> Result<ModelReply, SearchError>;
}

/// Anthropic Messages API client carrying the tool catalog on every call.
#[derive(Clone, Debug)]
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    tools: Vec<Value>,
}

impl AnthropicClient {
    pub fn new(config: &LlmConfig) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| SearchError::ModelUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            tools: tools::catalog_json(),
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn resolve(&self, prompt: &str) -> Result<ModelReply, SearchError> {
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{"role": "user", "content": prompt}],
            "tools": self.tools
        });

        let mut request = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|error| SearchError::ModelUnavailable(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_else(|_| "<unreadable body>".to_owned());
            return Err(SearchError::ModelUnavailable(format!("status {status}: {detail}")));
        }

        let payload: Value = response.json().await.map_err(|error| {
            SearchError::ModelUnavailable(format!("malformed model response: {error}"))
        })?;
        Ok(parse_reply(&payload))
    }
}

/// Scan the content blocks: gather text, keep the first tool_use. Unknown
/// block types are ignored rather than rejected.
pub(crate) fn parse_reply(payload: &Value) -> ModelReply {
    let mut reply = ModelReply::default();
    let mut text = String::new();

    for block in payload.get("content").and_then(Value::as_array).into_iter().flatten() {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(segment) = block.get("text").and_then(Value::as_str) {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(segment);
                }
            }
            Some("tool_use") if reply.invocation.is_none() => {
                if let Some(name) = block.get("name").and_then(Value::as_str) {
                    let arguments = block
                        .get("input")
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default();
                    reply.invocation =
                        Some(ToolInvocation { name: name.to_owned(), arguments });
                }
            }
            _ => {}
        }
    }

    if !text.is_empty() {
        reply.text = Some(text);
    }
    reply
}
