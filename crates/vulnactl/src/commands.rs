//! CLI command implementations: one-shot ask, demo queries and tool listing.

use anyhow::{Context, Result};
use console::style;

use crate::agent::{Agent, ChatOutcome};
use crate::registry::ToolRegistry;
use vulna_common::config::Config;
use vulna_common::llm::HttpLlmClient;
use vulna_common::prompts::get_system_prompt;

/// Demo queries showcasing the catalog, run in sequence.
const DEMO_QUERIES: [&str; 4] = [
    "Show me statistics on all CVEs in the database",
    "Find all critical severity CVEs, limit to 3",
    "What CVEs have a CVSS score between 9.0 and 10.0?",
    "Search for CVEs related to 'Directory Traversal'",
];

/// Build a full session: connected registry plus configured model client.
pub async fn build_agent(config: &Config) -> Result<Agent<HttpLlmClient, ToolRegistry>> {
    let registry = ToolRegistry::connect(&config.enabled_backends()).await;
    let llm = HttpLlmClient::new(&config.llm).context("Failed to configure LLM client")?;
    let tools = registry.descriptors().to_vec();

    Ok(Agent::new(
        llm,
        registry,
        tools,
        get_system_prompt(&config.agent.system_prompt),
        config.agent.max_iterations,
    ))
}

/// Answer a single query and release the session.
pub async fn ask(config: &Config, query: &str) -> Result<()> {
    let mut agent = build_agent(config).await?;
    let result = agent.chat(query).await;
    agent.into_dispatcher().shutdown().await;

    let outcome = result.context("LLM request failed")?;
    print_outcome(&outcome);
    Ok(())
}

/// Run the built-in demo queries back to back.
pub async fn demo(config: &Config) -> Result<()> {
    let mut agent = build_agent(config).await?;

    for (i, query) in DEMO_QUERIES.iter().enumerate() {
        println!();
        println!("{}", style(format!("Demo query {}: {}", i + 1, query)).bold());
        println!("{}", style("-".repeat(60)).dim());

        match agent.chat(query).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => println!("{} {}", style("Error:").red(), e),
        }
    }

    agent.into_dispatcher().shutdown().await;
    Ok(())
}

/// List every registered tool and its owning backend.
pub async fn tools(config: &Config) -> Result<()> {
    let registry = ToolRegistry::connect(&config.enabled_backends()).await;

    if registry.is_empty() {
        println!("No tools available. Are the backends running?");
    } else {
        for (backend, tool, description) in registry.tool_listing() {
            println!(
                "{} {}  {}",
                style(format!("[{}]", backend)).cyan(),
                style(&tool).bold(),
                style(truncate(&description, 70)).dim()
            );
        }
    }

    registry.shutdown().await;
    Ok(())
}

/// Print a chat outcome: the tool trail first (dimmed), then the answer.
pub fn print_outcome(outcome: &ChatOutcome) {
    for record in &outcome.tool_results {
        println!(
            "{} {}({})",
            style("tool:").dim(),
            style(&record.tool_name).dim(),
            style(compact(&record.tool_input)).dim()
        );
    }
    println!("{}", outcome.reply);
}

fn compact(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut.trim_end())
    }
}
