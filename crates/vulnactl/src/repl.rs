//! Interactive REPL for the CVE analyst agent.

use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};

use crate::commands::{build_agent, print_outcome};
use vulna_common::config::Config;

/// Run the interactive loop until the user quits or stdin closes.
pub async fn start_repl(config: &Config) -> Result<()> {
    println!("{}", style("CVE Query Agent - Interactive Mode").bold());
    println!("Ask questions about CVE vulnerabilities, for example:");
    println!("  - Show me critical CVEs");
    println!("  - Find CVE-2020-000001");
    println!("  - What are the CVEs with CVSS score above 9?");
    println!("  - Give me statistics on all CVEs");
    println!("Type 'quit' or 'exit' to stop.");
    println!();

    let mut agent = build_agent(config).await?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("{} ", style("you:").green().bold());
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let input = line.trim();

        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }

        match agent.chat(input).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => println!("{} {}", style("Error:").red(), e),
        }
        println!();
    }

    println!("Goodbye!");
    agent.into_dispatcher().shutdown().await;
    Ok(())
}
