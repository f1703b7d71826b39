//! Client for one tool-catalog backend.
//!
//! Connects over a Unix socket with bounded retries, optionally launching the
//! backend process first. One client per backend; the registry owns them for
//! the lifetime of the session.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::sleep;
use tracing::{debug, warn};

use vulna_common::config::BackendSettings;
use vulna_common::proto::{ContentPart, Method, Request, Response, ResponseData, ToolInfo};

static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

const CONNECT_ATTEMPTS: usize = 10;
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// A live session with one backend.
pub struct BackendClient {
    pub name: String,
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
    child: Option<tokio::process::Child>,
}

impl BackendClient {
    /// Launch (if configured) and connect to a backend, then initialize the
    /// session. Fails if the socket never comes up within the retry budget.
    pub async fn connect(settings: &BackendSettings) -> Result<Self> {
        let mut child = match &settings.command {
            Some(command) => {
                debug!("Launching backend '{}': {} {:?}", settings.name, command, settings.args);
                let child = tokio::process::Command::new(command)
                    .args(&settings.args)
                    .spawn()
                    .with_context(|| format!("Failed to launch backend '{}'", settings.name))?;
                Some(child)
            }
            None => None,
        };

        // A launched process must not outlive a failed connection attempt.
        let stream = match Self::connect_socket(&settings.socket).await {
            Ok(stream) => stream,
            Err(e) => {
                if let Some(mut child) = child.take() {
                    let _ = child.kill().await;
                }
                return Err(e);
            }
        };
        let (reader, writer) = stream.into_split();

        let mut client = Self {
            name: settings.name.clone(),
            reader: BufReader::new(reader),
            writer,
            child,
        };

        if let Err(e) = client.initialize().await {
            let _ = client.shutdown().await;
            return Err(e);
        }
        Ok(client)
    }

    /// Connect with retries; freshly launched backends need a moment to bind.
    async fn connect_socket(path: &Path) -> Result<UnixStream> {
        let mut retry_delay = Duration::from_millis(50);

        for attempt in 0..CONNECT_ATTEMPTS {
            match tokio::time::timeout(CONNECT_TIMEOUT, UnixStream::connect(path)).await {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) if attempt == CONNECT_ATTEMPTS - 1 => {
                    return Err(e).with_context(|| {
                        format!("Failed to connect to backend socket {}", path.display())
                    });
                }
                _ => {
                    sleep(retry_delay).await;
                    retry_delay = (retry_delay * 2).min(Duration::from_millis(500));
                }
            }
        }

        anyhow::bail!("Backend socket {} never became ready", path.display())
    }

    async fn initialize(&mut self) -> Result<()> {
        let data = self
            .call(Method::Initialize {
                client_name: "vulnactl".to_string(),
                client_version: env!("CARGO_PKG_VERSION").to_string(),
            })
            .await?;

        match data {
            ResponseData::ServerInfo { name, version } => {
                debug!("Backend '{}' is {} v{}", self.name, name, version);
                Ok(())
            }
            other => anyhow::bail!("Unexpected Initialize response: {:?}", other),
        }
    }

    /// Enumerate the operations this backend serves.
    pub async fn list_tools(&mut self) -> Result<Vec<ToolInfo>> {
        match self.call(Method::ListTools).await? {
            ResponseData::Tools(tools) => Ok(tools),
            other => anyhow::bail!("Unexpected ListTools response: {:?}", other),
        }
    }

    /// Invoke one operation with named arguments.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<Vec<ContentPart>> {
        let data = self
            .call(Method::CallTool {
                name: name.to_string(),
                arguments,
            })
            .await?;

        match data {
            ResponseData::ToolOutput { content } => Ok(content),
            other => anyhow::bail!("Unexpected CallTool response: {:?}", other),
        }
    }

    /// Close the session and reap a launched backend process. Best effort:
    /// a dead peer is not an error worth failing shutdown over.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Err(e) = self.call(Method::Shutdown).await {
            debug!("Backend '{}' shutdown request failed: {}", self.name, e);
        }

        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop backend '{}' process: {}", self.name, e);
            }
        }
        Ok(())
    }

    async fn call(&mut self, method: Method) -> Result<ResponseData> {
        let id = REQUEST_ID.fetch_add(1, Ordering::SeqCst);
        let request = Request { id, method };

        let line = serde_json::to_string(&request)? + "\n";
        self.writer
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to send request to backend '{}'", self.name))?;

        let mut buf = String::new();
        let bytes_read = self
            .reader
            .read_line(&mut buf)
            .await
            .with_context(|| format!("Failed to read response from backend '{}'", self.name))?;
        if bytes_read == 0 {
            anyhow::bail!("Backend '{}' closed the connection", self.name);
        }

        let response: Response =
            serde_json::from_str(&buf).context("Invalid response JSON from backend")?;
        if response.id != id {
            anyhow::bail!(
                "Backend '{}' answered request {} with id {}",
                self.name,
                id,
                response.id
            );
        }

        response
            .result
            .map_err(|e| anyhow::anyhow!("Backend '{}' error: {}", self.name, e))
    }
}
