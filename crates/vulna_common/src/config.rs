//! Configuration for the agent and its tool-catalog backends.
//!
//! Loaded from an explicit path, `$VULNA_CONFIG`, or
//! `~/.config/vulna/config.toml`. A missing file falls back to defaults with
//! a warning so a fresh install still starts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "VULNA_CONFIG";

/// Chat-completions endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Model name passed through to the endpoint.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the environment variable holding the API key.
    /// Local servers need none.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Response token cap; omitted from the request when unset.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_model() -> String {
    "qwen2.5:7b-instruct".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:11434/v1".to_string()
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: None,
            max_tokens: None,
        }
    }
}

/// Conversation-loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// System prompt variant: default, concise, detailed or analytics.
    #[serde(default = "default_prompt_variant")]
    pub system_prompt: String,

    /// Upper bound on tool rounds per chat invocation.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_prompt_variant() -> String {
    "default".to_string()
}

fn default_max_iterations() -> usize {
    5
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            system_prompt: default_prompt_variant(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// One tool-catalog backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Unix socket the backend listens on.
    pub socket: PathBuf,

    /// Optional launch command; when set, the registry spawns it before
    /// connecting and kills it on shutdown.
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default, rename = "backend")]
    pub backends: Vec<BackendSettings>,
}

impl Config {
    /// Load configuration, falling back to defaults when no file exists.
    ///
    /// Precedence: explicit path, `$VULNA_CONFIG`, then the user config dir.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => match std::env::var(CONFIG_ENV) {
                Ok(p) if !p.is_empty() => Some(PathBuf::from(p)),
                _ => Self::default_path(),
            },
        };

        match path {
            Some(ref p) if p.exists() => Self::from_file(p),
            Some(ref p) => {
                warn!("Config file {} not found, using defaults", p.display());
                Ok(Self::default())
            }
            None => {
                warn!("Could not determine config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_str(&raw)
    }

    pub fn from_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse config file")
    }

    /// Backends that should be connected at session start.
    pub fn enabled_backends(&self) -> Vec<&BackendSettings> {
        self.backends.iter().filter(|b| b.enabled).collect()
    }

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("vulna").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.agent.system_prompt, "default");
        assert!(config.backends.is_empty());
        assert!(config.llm.base_url.contains("11434"));
    }

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
            [llm]
            model = "gpt-4o-mini"
            base_url = "https://api.openai.com/v1"
            api_key_env = "OPENAI_API_KEY"
            max_tokens = 800

            [agent]
            system_prompt = "analytics"
            max_iterations = 8

            [[backend]]
            name = "cve"
            socket = "/run/vulna/cve.sock"
            command = "vulnad"
            args = ["serve", "--socket", "/run/vulna/cve.sock"]

            [[backend]]
            name = "advisories"
            enabled = false
            socket = "/run/vulna/advisories.sock"
        "#;

        let config = Config::from_str(raw).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.agent.max_iterations, 8);
        assert_eq!(config.backends.len(), 2);

        // Disabled backends are filtered out of the connect list.
        let enabled = config.enabled_backends();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "cve");
        assert_eq!(enabled[0].args.len(), 3);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config = Config::from_str("[llm]\nmodel = \"llama3.2:3b\"\n").unwrap();
        assert_eq!(config.llm.model, "llama3.2:3b");
        assert_eq!(config.llm.base_url, "http://127.0.0.1:11434/v1");
        assert_eq!(config.agent.max_iterations, 5);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::from_str("[[llm").is_err());
    }
}
