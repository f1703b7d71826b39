//! Vulna tool server - serves CVE query operations to the agent.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vulnad::server::{self, ServerState};
use vulnad::store::CveStore;
use vulnad::import;

/// Advertised backend name, matching the original query server.
const SERVER_NAME: &str = "cve-query-server";

#[derive(Parser)]
#[command(name = "vulnad")]
#[command(about = "Vulna tool server - CVE query backend", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the tool catalog on a Unix socket
    Serve {
        /// Socket path to listen on
        #[arg(long, default_value = "/run/vulna/cve.sock")]
        socket: PathBuf,

        /// SQLite database holding the CVE collection
        #[arg(long, default_value = "/var/lib/vulna/cve.db")]
        db: PathBuf,
    },

    /// Import CVE records from a JSON array file
    Import {
        #[arg(long, default_value = "/var/lib/vulna/cve.db")]
        db: PathBuf,

        /// JSON file to import
        #[arg(long)]
        file: PathBuf,
    },

    /// Print collection statistics
    Stats {
        #[arg(long, default_value = "/var/lib/vulna/cve.db")]
        db: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { socket, db } => {
            info!("vulnad v{} starting", env!("CARGO_PKG_VERSION"));
            let store = CveStore::open(&db).await?;
            let state = Arc::new(ServerState::new(SERVER_NAME, store));
            server::start_server(&socket, state).await
        }

        Commands::Import { db, file } => {
            let store = CveStore::open(&db).await?;
            let report = import::import_file(&store, &file).await?;
            println!("Imported {} records ({} failed)", report.imported, report.failed);
            Ok(())
        }

        Commands::Stats { db } => {
            let store = CveStore::open(&db).await?;
            let stats = store.statistics().await?;
            println!("Total CVEs: {}", stats.total_cves);
            for entry in &stats.by_severity {
                println!(
                    "  {:<10} {:>6}  (avg CVSS {:.2})",
                    entry.severity, entry.count, entry.avg_cvss
                );
            }
            println!("CISA KEV:      {}", stats.cisa_kev_count);
            println!("With exploits: {}", stats.with_exploit_count);
            Ok(())
        }
    }
}
