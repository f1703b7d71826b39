//! Shared library for Vulna: record types, the backend wire protocol,
//! the LLM chat-completions client, configuration and system prompts.

pub mod config;
pub mod llm;
pub mod prompts;
pub mod proto;
pub mod types;

pub use config::{AgentSettings, BackendSettings, Config, LlmSettings};
pub use types::{CveRecord, CveStatistics, ListEnvelope, SeverityCount, ToolReply};
