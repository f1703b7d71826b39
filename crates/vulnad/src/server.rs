//! Unix-socket server exposing the tool catalog.
//!
//! Line-delimited JSON, one `Request` per line. Sessions are independent;
//! each connection must send `Initialize` before any `CallTool`.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use crate::catalog::ToolCatalog;
use crate::store::CveStore;
use vulna_common::proto::{ContentPart, Method, Request, Response, ResponseData};
use vulna_common::types::ToolReply;

/// Shared server state. Operations are stateless and read-only, so one state
/// instance serves every connection.
pub struct ServerState {
    pub name: String,
    pub version: String,
    pub store: CveStore,
    pub catalog: ToolCatalog,
}

impl ServerState {
    pub fn new(name: impl Into<String>, store: CveStore) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            store,
            catalog: ToolCatalog::new(),
        }
    }
}

/// Bind the socket and serve until the process is stopped.
pub async fn start_server(socket_path: &Path, state: Arc<ServerState>) -> Result<()> {
    if let Some(dir) = socket_path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .context("Failed to create socket directory")?;
    }

    // Remove a stale socket from a previous run.
    let _ = tokio::fs::remove_file(socket_path).await;

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind Unix socket {}", socket_path.display()))?;

    info!("Tool server '{}' listening on {}", state.name, socket_path.display());

    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, state: Arc<ServerState>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    let mut initialized = false;

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .context("Failed to read from socket")?;

        if bytes_read == 0 {
            break;
        }

        let request: Request = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                warn!("Invalid request JSON: {}", e);
                continue;
            }
        };

        let shutdown = matches!(request.method, Method::Shutdown);
        let result = handle_request(request.method, &state, &mut initialized).await;
        let response = Response {
            id: request.id,
            result,
        };

        let response_json = serde_json::to_string(&response)? + "\n";
        writer
            .write_all(response_json.as_bytes())
            .await
            .context("Failed to write response")?;

        if shutdown {
            debug!("Session closed by client");
            break;
        }
    }

    Ok(())
}

async fn handle_request(
    method: Method,
    state: &ServerState,
    initialized: &mut bool,
) -> Result<ResponseData, String> {
    match method {
        Method::Initialize {
            client_name,
            client_version,
        } => {
            debug!("Session initialized by {} {}", client_name, client_version);
            *initialized = true;
            Ok(ResponseData::ServerInfo {
                name: state.name.clone(),
                version: state.version.clone(),
            })
        }

        Method::ListTools => Ok(ResponseData::Tools(state.catalog.list())),

        Method::CallTool { name, arguments } => {
            if !*initialized {
                return Err("session not initialized: send Initialize first".to_string());
            }
            let reply = state.catalog.execute(&state.store, &name, &arguments).await;
            Ok(ResponseData::ToolOutput {
                content: reply_to_content(reply),
            })
        }

        Method::Ping => Ok(ResponseData::Ok),

        Method::Shutdown => Ok(ResponseData::Ok),
    }
}

/// Render a reply as content parts. Structured variants travel as data parts;
/// sentinels and error descriptions travel as text.
fn reply_to_content(reply: ToolReply) -> Vec<ContentPart> {
    match reply {
        ToolReply::Text { text } => vec![ContentPart::text(text)],
        structured => match serde_json::to_value(&structured) {
            Ok(value) => vec![ContentPart::data(value)],
            Err(e) => vec![ContentPart::text(format!("Error: failed to encode result: {}", e))],
        },
    }
}
