//! Wire protocol between the agent and tool-catalog backends.
//!
//! Line-delimited JSON over a Unix socket. A session is:
//! `Initialize` -> `ListTools` -> repeated `CallTool` -> `Shutdown`.
//! `CallTool` before `Initialize` is rejected by the server.

use serde::{Deserialize, Serialize};

/// Request from the agent to a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: Method,
}

/// Response from a backend. Protocol-level failures travel in `result`;
/// operation-level failures are reported inside `ToolOutput` content so the
/// model can see them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub result: Result<ResponseData, String>,
}

/// Request methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum Method {
    /// Open the session. Must precede any `CallTool`.
    Initialize {
        client_name: String,
        client_version: String,
    },

    /// Enumerate the operations this backend serves.
    ListTools,

    /// Invoke one operation with named arguments.
    CallTool {
        name: String,
        arguments: serde_json::Value,
    },

    /// Health check.
    Ping,

    /// Close the session.
    Shutdown,
}

/// Response payload variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ResponseData {
    /// Initialize result.
    ServerInfo { name: String, version: String },

    /// ListTools result.
    Tools(Vec<ToolInfo>),

    /// CallTool result.
    ToolOutput { content: Vec<ContentPart> },

    /// Ping / Shutdown acknowledgement.
    Ok,
}

/// One operation as advertised by a backend: name, human description and a
/// JSON-schema object describing the named parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// One part of a tool result. Non-text parts are stringified by the
/// dispatcher before reaching the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Data { value: serde_json::Value },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn data(value: serde_json::Value) -> Self {
        ContentPart::Data { value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_round_trip() {
        let req = Request {
            id: 7,
            method: Method::CallTool {
                name: "query_cve_by_severity".to_string(),
                arguments: serde_json::json!({"severity": "HIGH", "limit": 3}),
            },
        };

        let line = serde_json::to_string(&req).unwrap();
        let back: Request = serde_json::from_str(&line).unwrap();
        assert_eq!(back.id, 7);
        match back.method {
            Method::CallTool { name, arguments } => {
                assert_eq!(name, "query_cve_by_severity");
                assert_eq!(arguments["limit"], 3);
            }
            other => panic!("unexpected method: {:?}", other),
        }
    }

    #[test]
    fn test_error_response_serializes() {
        let resp = Response {
            id: 1,
            result: Err("not initialized".to_string()),
        };
        let line = serde_json::to_string(&resp).unwrap();
        let back: Response = serde_json::from_str(&line).unwrap();
        assert!(back.result.is_err());
    }

    #[test]
    fn test_content_part_tagging() {
        let part = ContentPart::text("No result returned");
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "text");

        let part = ContentPart::data(serde_json::json!({"count": 0}));
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "data");
        assert_eq!(json["value"]["count"], 0);
    }
}
