//! Tool registry and dispatcher over one or more backends.
//!
//! Built once per session: every enabled backend is connected, its tools are
//! converted to the descriptor shape the model expects, and each tool name is
//! routed to its owning backend. Duplicate names across backends resolve to
//! the last-registered backend; the collision is logged, not fatal.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::backend::BackendClient;
use vulna_common::config::BackendSettings;
use vulna_common::llm::ToolDescriptor;
use vulna_common::proto::{ContentPart, ToolInfo};

/// Returned by the dispatcher when a call produced no content.
pub const NO_RESULT_SENTINEL: &str = "No result returned";

/// Seam between the conversation loop and tool execution. Implementations
/// never fail: every error is folded into the returned text so the model can
/// see it and recover.
#[async_trait]
pub trait ToolDispatch: Send {
    async fn invoke(&mut self, tool_name: &str, arguments: &serde_json::Value) -> String;
}

/// Session-wide registry of connected backends and their tools.
pub struct ToolRegistry {
    backends: Vec<BackendClient>,
    routes: HashMap<String, usize>,
    descriptors: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// Connect every enabled backend. A backend that fails to come up is
    /// skipped with a warning; the session proceeds with what connected.
    pub async fn connect(settings: &[&BackendSettings]) -> Self {
        let mut backends = Vec::new();
        let mut advertised = Vec::new();

        for config in settings {
            match BackendClient::connect(config).await {
                Ok(mut client) => match client.list_tools().await {
                    Ok(tools) => {
                        info!("Connected to backend '{}' ({} tools)", config.name, tools.len());
                        advertised.push((client.name.clone(), tools));
                        backends.push(client);
                    }
                    Err(e) => {
                        warn!("Backend '{}' refused tool listing: {}", config.name, e);
                    }
                },
                Err(e) => {
                    warn!("Failed to connect to backend '{}': {}", config.name, e);
                }
            }
        }

        let (descriptors, routes, collisions) = build_routes(&advertised);
        for name in &collisions {
            warn!("Tool '{}' served by multiple backends; last registration wins", name);
        }

        if descriptors.is_empty() {
            warn!("No tools available: the model will answer without database access");
        } else {
            info!("Total tools available: {}", descriptors.len());
        }

        Self {
            backends,
            routes,
            descriptors,
        }
    }

    /// Tool descriptors in the shape the chat-completions API expects.
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// (backend, tool, description) triples for display.
    pub fn tool_listing(&self) -> Vec<(String, String, String)> {
        let mut listing: Vec<_> = self
            .routes
            .iter()
            .map(|(tool, &idx)| {
                let description = self
                    .descriptors
                    .iter()
                    .find(|d| d.name() == tool)
                    .map(|d| d.function.description.clone())
                    .unwrap_or_default();
                (self.backends[idx].name.clone(), tool.clone(), description)
            })
            .collect();
        listing.sort();
        listing
    }

    /// Release every backend connection, continuing past individual failures.
    /// Safe to call after a partially failed setup.
    pub async fn shutdown(self) {
        for backend in self.backends {
            let name = backend.name.clone();
            if let Err(e) = backend.shutdown().await {
                warn!("Error disconnecting backend '{}': {}", name, e);
            }
        }
    }
}

#[async_trait]
impl ToolDispatch for ToolRegistry {
    async fn invoke(&mut self, tool_name: &str, arguments: &serde_json::Value) -> String {
        let idx = match self.routes.get(tool_name) {
            Some(&idx) => idx,
            None => {
                return format!(
                    "Error: tool '{}' not found in any connected backend",
                    tool_name
                );
            }
        };

        match self.backends[idx].call_tool(tool_name, arguments.clone()).await {
            Ok(content) => flatten_content(&content),
            Err(e) => format!("Error: {}", e),
        }
    }
}

/// Build the descriptor list and the name -> backend routing table.
///
/// Deterministic in input order: a name served by several backends keeps one
/// descriptor, owned by the backend registered last. Returns the colliding
/// names for logging.
fn build_routes(
    advertised: &[(String, Vec<ToolInfo>)],
) -> (Vec<ToolDescriptor>, HashMap<String, usize>, Vec<String>) {
    let mut descriptors: Vec<ToolDescriptor> = Vec::new();
    let mut routes: HashMap<String, usize> = HashMap::new();
    let mut collisions = Vec::new();

    for (idx, (backend_name, tools)) in advertised.iter().enumerate() {
        for tool in tools {
            let descriptor = ToolDescriptor::function(
                tool.name.clone(),
                format!("[{}] {}", backend_name, tool.description),
                tool.input_schema.clone(),
            );

            if routes.insert(tool.name.clone(), idx).is_some() {
                collisions.push(tool.name.clone());
                let pos = descriptors
                    .iter()
                    .position(|d| d.name() == tool.name)
                    .expect("colliding tool must already have a descriptor");
                descriptors[pos] = descriptor;
            } else {
                descriptors.push(descriptor);
            }
        }
    }

    (descriptors, routes, collisions)
}

/// Normalize backend content parts into one text payload: text parts as-is,
/// data parts stringified, joined by newlines; empty content yields a fixed
/// sentinel.
fn flatten_content(content: &[ContentPart]) -> String {
    if content.is_empty() {
        return NO_RESULT_SENTINEL.to_string();
    }

    content
        .iter()
        .map(|part| match part {
            ContentPart::Text { text } => text.clone(),
            ContentPart::Data { value } => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
