//! OpenAI-compatible chat-completions client with tool calling.
//!
//! Works against any endpoint speaking the `/chat/completions` contract
//! (Ollama, vLLM, OpenAI). The API key is read from a configured environment
//! variable; local servers run without one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;

use crate::config::LlmSettings;

/// Finish reason for a normal text answer.
pub const FINISH_STOP: &str = "stop";
/// Finish reason when the model requests tool invocations.
pub const FINISH_TOOL_CALLS: &str = "tool_calls";

/// One entry of the conversation transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content)
    }

    /// A `tool` message carrying one dispatched result, keyed by call id.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn plain(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// A model-issued tool invocation. `arguments` is a JSON-encoded string,
/// parsed by the conversation loop per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

/// A tool as presented to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDescriptor {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDescriptor]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    finish_reason: Option<String>,
    message: ChatMessage,
}

/// One model turn: the raw finish reason and the assistant message.
#[derive(Debug, Clone)]
pub struct LlmTurn {
    pub finish_reason: String,
    pub message: ChatMessage,
}

/// LLM errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Seam between the conversation loop and the model endpoint. The loop is
/// written against this trait so tests can script responses.
#[async_trait]
pub trait LlmApi: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<LlmTurn, LlmError>;
}

/// HTTP client for an OpenAI-compatible endpoint.
pub struct HttpLlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: Option<u32>,
}

impl HttpLlmClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        if settings.model.is_empty() {
            return Err(LlmError::Config("model is required".to_string()));
        }
        if settings.base_url.is_empty() {
            return Err(LlmError::Config("base_url is required".to_string()));
        }

        // API key is optional: local servers accept unauthenticated requests.
        let api_key = match &settings.api_key_env {
            Some(var) => match env::var(var) {
                Ok(key) if !key.is_empty() => Some(key),
                _ => None,
            },
            None => None,
        };

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
            max_tokens: settings.max_tokens,
        })
    }
}

#[async_trait]
impl LlmApi for HttpLlmClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<LlmTurn, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            messages,
            tools: if tools.is_empty() { None } else { Some(tools) },
            tool_choice: if tools.is_empty() { None } else { Some("auto") },
            max_tokens: self.max_tokens,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::Http(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Http(format!("HTTP {}: {}", status, body)));
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Http(format!("failed to parse response: {}", e)))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Protocol("response carried no choices".to_string()))?;

        Ok(LlmTurn {
            finish_reason: choice
                .finish_reason
                .unwrap_or_else(|| "unknown".to_string()),
            message: choice.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmSettings;

    #[test]
    fn test_request_serialization_with_tools() {
        let messages = vec![ChatMessage::system("analyst"), ChatMessage::user("hi")];
        let tools = vec![ToolDescriptor::function(
            "query_cve_by_number",
            "Look up one CVE",
            serde_json::json!({"type": "object", "properties": {}}),
        )];

        let request = ChatRequest {
            model: "qwen2.5:7b-instruct",
            messages: &messages,
            tools: Some(&tools),
            tool_choice: Some("auto"),
            max_tokens: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["tool_choice"], "auto");
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "query_cve_by_number");
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_response_with_tool_calls_parses() {
        let raw = r#"{
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "get_cve_statistics",
                            "arguments": "{}"
                        }
                    }]
                }
            }]
        }"#;

        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        let choice = &parsed.choices[0];
        assert_eq!(choice.finish_reason.as_deref(), Some(FINISH_TOOL_CALLS));
        let calls = choice.message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "get_cve_statistics");
    }

    #[test]
    fn test_tool_message_carries_call_id() {
        let msg = ChatMessage::tool("call_9", "No result returned");
        assert_eq!(msg.role, "tool");
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_9"));

        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("tool_calls").is_none());
    }

    #[test]
    fn test_client_requires_model_and_base_url() {
        let mut settings = LlmSettings::default();
        settings.model = String::new();
        assert!(matches!(
            HttpLlmClient::new(&settings),
            Err(LlmError::Config(_))
        ));

        let mut settings = LlmSettings::default();
        settings.base_url = String::new();
        assert!(matches!(
            HttpLlmClient::new(&settings),
            Err(LlmError::Config(_))
        ));
    }
}
