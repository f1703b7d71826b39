//! End-to-end session test: a raw client speaking the wire protocol against
//! a live server on a temporary socket.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use vulna_common::proto::{ContentPart, Method, Request, Response, ResponseData};
use vulna_common::types::CveRecord;
use vulnad::server::{start_server, ServerState};
use vulnad::store::CveStore;

struct TestClient {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
    next_id: u64,
}

impl TestClient {
    async fn connect(path: &std::path::Path) -> Self {
        // The server task needs a moment to bind the socket.
        let mut attempts = 0;
        let stream = loop {
            match UnixStream::connect(path).await {
                Ok(stream) => break stream,
                Err(_) if attempts < 50 => {
                    attempts += 1;
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
                Err(e) => panic!("failed to connect to test server: {}", e),
            }
        };
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
            next_id: 1,
        }
    }

    async fn call(&mut self, method: Method) -> Response {
        let id = self.next_id;
        self.next_id += 1;

        let line = serde_json::to_string(&Request { id, method }).unwrap() + "\n";
        self.writer.write_all(line.as_bytes()).await.unwrap();

        let mut buf = String::new();
        self.reader.read_line(&mut buf).await.unwrap();
        let response: Response = serde_json::from_str(&buf).unwrap();
        assert_eq!(response.id, id);
        response
    }
}

fn record(number: &str, severity: &str, score: f64) -> CveRecord {
    CveRecord {
        cve_number: number.to_string(),
        cve_title: format!("Issue {}", number),
        severity: severity.to_string(),
        cvss_score: score,
        description: "Heap overflow in request parsing".to_string(),
        keywords: "overflow".to_string(),
        affected_products: "Acme Gateway".to_string(),
        classifications_exploit: "Exploit Exists".to_string(),
        classifications_attack_type: "Buffer Overflow".to_string(),
        classifications_location: "Remote".to_string(),
        classifications_impact: "Code Execution".to_string(),
        cisa_key: "No".to_string(),
        remediation: None,
        source_last_modified_date: None,
    }
}

#[tokio::test]
async fn test_full_session_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("cve.sock");

    let store = CveStore::open_in_memory().unwrap();
    store.insert(&record("CVE-2024-000001", "CRITICAL", 9.8)).await.unwrap();
    store.insert(&record("CVE-2024-000002", "HIGH", 7.5)).await.unwrap();

    let state = Arc::new(ServerState::new("cve-query-server", store));
    let server = tokio::spawn({
        let socket = socket.clone();
        async move { start_server(&socket, state).await }
    });

    let mut client = TestClient::connect(&socket).await;

    // CallTool before Initialize is a protocol error.
    let early = client
        .call(Method::CallTool {
            name: "get_cve_statistics".to_string(),
            arguments: serde_json::json!({}),
        })
        .await;
    assert!(early.result.unwrap_err().contains("not initialized"));

    let info = client
        .call(Method::Initialize {
            client_name: "session-test".to_string(),
            client_version: "0.0.0".to_string(),
        })
        .await;
    match info.result.unwrap() {
        ResponseData::ServerInfo { name, .. } => assert_eq!(name, "cve-query-server"),
        other => panic!("expected ServerInfo, got {:?}", other),
    }

    let tools = client.call(Method::ListTools).await;
    match tools.result.unwrap() {
        ResponseData::Tools(tools) => {
            assert_eq!(tools.len(), 10);
            assert!(tools.iter().any(|t| t.name == "query_cve_by_cvss_range"));
        }
        other => panic!("expected Tools, got {:?}", other),
    }

    let output = client
        .call(Method::CallTool {
            name: "query_cve_by_cvss_range".to_string(),
            arguments: serde_json::json!({"min_score": 9.0, "max_score": 10.0}),
        })
        .await;
    match output.result.unwrap() {
        ResponseData::ToolOutput { content } => match &content[0] {
            ContentPart::Data { value } => {
                assert_eq!(value["count"], 1);
                assert_eq!(value["results"][0]["cve_number"], "CVE-2024-000001");
            }
            other => panic!("expected Data part, got {:?}", other),
        },
        other => panic!("expected ToolOutput, got {:?}", other),
    }

    let bye = client.call(Method::Shutdown).await;
    assert!(matches!(bye.result.unwrap(), ResponseData::Ok));

    server.abort();
}
