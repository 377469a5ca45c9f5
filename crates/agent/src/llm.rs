use std::time::Duration;

use async_trait::async_trait;
use joblab_core::config::LlmConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: vec![ContentBlock::text(text)] }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self { role: Role::Assistant, content }
    }

    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self { role: Role::User, content: results }
    }
}

/// Tool declaration advertised to the model.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Clone, Debug, Default)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// A tool call requested by the model.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CompletionReply {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub model: String,
}

impl CompletionReply {
    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some(ToolCall { id: id.clone(), name: name.clone(), input: input.clone() })
                }
                _ => None,
            })
            .collect()
    }

    pub fn has_tool_use(&self) -> bool {
        self.stop_reason.as_deref() == Some("tool_use")
            && self.content.iter().any(|block| matches!(block, ContentBlock::ToolUse { .. }))
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("completion transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion response could not be decoded: {0}")]
    Decode(String),
    #[error("completion service api key is not configured")]
    MissingApiKey,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply, LlmError>;
}

/// Messages API client.
pub struct AnthropicClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or(LlmError::MissingApiKey)?;
        let client =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": request.system,
            "messages": request.messages,
        });
        if !request.tools.is_empty() {
            body["tools"] = json!(request.tools);
        }
        body
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply, LlmError> {
        debug!(
            event_name = "llm.request",
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending completion request"
        );
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.body(request))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            warn!(
                event_name = "llm.status",
                status = status.as_u16(),
                "completion request rejected"
            );
            return Err(LlmError::Status { status: status.as_u16(), body: text });
        }

        let mut reply: CompletionReply =
            serde_json::from_str(&text).map_err(|error| LlmError::Decode(error.to_string()))?;
        if reply.model.is_empty() {
            reply.model = self.model.clone();
        }
        debug!(
            event_name = "llm.reply",
            stop_reason = reply.stop_reason.as_deref().unwrap_or("none"),
            input_tokens = reply.usage.input_tokens,
            output_tokens = reply.usage.output_tokens,
            "completion received"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{CompletionReply, ContentBlock, Message};

    #[test]
    fn reply_decodes_mixed_content() {
        let reply: CompletionReply = serde_json::from_value(json!({
            "model": "m",
            "stop_reason": "tool_use",
            "usage": { "input_tokens": 12, "output_tokens": 3 },
            "content": [
                { "type": "text", "text": "Looking that up." },
                {
                    "type": "tool_use",
                    "id": "t1",
                    "name": "search_jobs",
                    "input": { "country": "DE" }
                }
            ]
        }))
        .expect("decode");

        assert!(reply.has_tool_use());
        assert_eq!(reply.text(), "Looking that up.");
        let calls = reply.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].input["country"], "DE");
        assert_eq!(reply.usage.input_tokens, 12);
    }

    #[test]
    fn tool_use_requires_matching_stop_reason() {
        let reply = CompletionReply {
            content: vec![ContentBlock::ToolUse {
                id: "t1".into(),
                name: "job_stats".into(),
                input: json!({}),
            }],
            stop_reason: Some("end_turn".into()),
            usage: Default::default(),
            model: String::new(),
        };

        assert!(!reply.has_tool_use());
    }

    #[test]
    fn tool_results_serialize_in_wire_shape() {
        let message = Message::tool_results(vec![
            ContentBlock::ToolResult {
                tool_use_id: "t1".into(),
                content: "[]".into(),
                is_error: false,
            },
            ContentBlock::ToolResult {
                tool_use_id: "t2".into(),
                content: "{}".into(),
                is_error: true,
            },
        ]);

        let value = serde_json::to_value(&message).expect("encode");

        assert_eq!(value["role"], "user");
        assert_eq!(
            value["content"][0],
            json!({ "type": "tool_result", "tool_use_id": "t1", "content": "[]" })
        );
        assert_eq!(value["content"][1]["is_error"], true);
    }
}
