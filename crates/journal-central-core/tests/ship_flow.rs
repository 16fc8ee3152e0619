//! End-to-end shipping and registration tests
//!
//! These tests run the real reqwest transport against an in-process mock of
//! the central service, with a scripted command runner standing in for
//! systemctl and journalctl.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use journal_central_core::{
    AgentError, CommandOutput, CommandRunner, Credential, CredentialStore, DeviceRegistrar,
    ExecError, FileCredentialStore, InvocationTarget, LogShipper, RegistrationRequest,
    ReqwestTransport, ShipRequest, ShipperConfig, SubmissionOutcome,
};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// Request as seen by the mock central service
#[derive(Debug, Clone, Default)]
struct Captured {
    path: String,
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Vec<u8>,
}

#[derive(Clone)]
struct MockCentral {
    status: StatusCode,
    body: &'static str,
    hits: Arc<AtomicUsize>,
    captured: Arc<Mutex<Vec<Captured>>>,
}

impl MockCentral {
    fn new(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            body,
            hits: Arc::new(AtomicUsize::new(0)),
            captured: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn last(&self) -> Captured {
        self.captured.lock().unwrap().last().cloned().expect("no request captured")
    }

    fn record(&self, captured: Captured) -> (StatusCode, &'static str) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.captured.lock().unwrap().push(captured);
        (self.status, self.body)
    }
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

async fn create_log_entry(
    State(central): State<MockCentral>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    central.record(Captured {
        path: "/api/logEntries/create".to_string(),
        headers: header_map(&headers),
        body: body.to_vec(),
        ..Captured::default()
    })
}

async fn register_device(
    State(central): State<MockCentral>,
    Path(organisation): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, &'static str) {
    central.record(Captured {
        path: format!("/api/devices/register/{}", organisation),
        headers: header_map(&headers),
        query,
        ..Captured::default()
    })
}

/// Serve the mock on an ephemeral port and return its base URL
async fn spawn_central(central: MockCentral) -> String {
    let app = Router::new()
        .route("/api/logEntries/create", post(create_log_entry))
        .route("/api/devices/register/:organisation", get(register_device))
        .with_state(central);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Answers each program with a fixed output and records every call
#[derive(Default)]
struct ScriptedRunner {
    outputs: HashMap<String, CommandOutput>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedRunner {
    fn with(mut self, program: &str, output: CommandOutput) -> Self {
        self.outputs.insert(program.to_string(), output);
        self
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, ExecError> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));
        self.outputs.get(program).cloned().ok_or_else(|| ExecError::Spawn {
            program: program.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not scripted"),
        })
    }
}

fn shipper(runner: ScriptedRunner, base_url: &str) -> LogShipper<ScriptedRunner, ReqwestTransport> {
    let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
    LogShipper::new(
        runner,
        transport,
        ShipperConfig {
            base_url: base_url.to_string(),
            systemctl: "systemctl".to_string(),
            journalctl: "journalctl".to_string(),
            debug: true,
        },
    )
}

fn ship_request(target: InvocationTarget) -> ShipRequest {
    ShipRequest {
        target: Some(target),
        source: "someSource".to_string(),
        class: "someClass".to_string(),
    }
}

fn credential() -> Credential {
    Credential::new("someToken").unwrap()
}

// ============================================================================
// Shipping
// ============================================================================

#[tokio::test]
async fn test_ship_success() {
    let central = MockCentral::new(StatusCode::OK, r#"{"message":"ok"}"#);
    let base_url = spawn_central(central.clone()).await;

    let journal = "Oct 19 10:00:01 host setup[1]: \"console\" ready\r\n\tC:\\boot\n";
    let runner = ScriptedRunner::default()
        .with("systemctl", CommandOutput::success("  xyz789\n"))
        .with("journalctl", CommandOutput::success(journal));

    let outcome = shipper(runner, &base_url)
        .ship(
            &ship_request(InvocationTarget::Service("console-setup.service".into())),
            &credential(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, SubmissionOutcome::Success { status: 200 });
    assert_eq!(central.hits(), 1);

    let request = central.last();
    assert_eq!(request.headers["content-type"], "application/json");
    assert_eq!(request.headers["accept"], "application/json");
    assert_eq!(request.headers["authorization"], "Bearer someToken");

    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    let object = body.as_object().unwrap();
    assert_eq!(object.len(), 3);
    assert_eq!(object["source"], "someSource");
    assert_eq!(object["class"], "someClass");

    // The content field itself decodes back to the raw journal text.
    let content = object["content"].as_str().unwrap();
    let decoded: String = serde_json::from_str(&format!("\"{}\"", content)).unwrap();
    assert_eq!(decoded, journal);
}

#[tokio::test]
async fn test_ship_queries_journal_with_resolved_id() {
    let central = MockCentral::new(StatusCode::CREATED, "");
    let base_url = spawn_central(central.clone()).await;

    let runner = Arc::new(
        ScriptedRunner::default()
            .with("systemctl", CommandOutput::success("xyz789\n"))
            .with("journalctl", CommandOutput::success("line\n")),
    );
    let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
    let shipper = LogShipper::new(
        Arc::clone(&runner),
        transport,
        ShipperConfig {
            base_url,
            systemctl: "systemctl".to_string(),
            journalctl: "journalctl".to_string(),
            debug: false,
        },
    );

    let outcome = shipper
        .ship(
            &ship_request(InvocationTarget::Service("backup.service".into())),
            &credential(),
        )
        .await
        .unwrap();
    assert!(outcome.is_success());

    let calls = runner.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            (
                "systemctl".to_string(),
                vec!["show", "-p", "InvocationID", "--value", "backup.service"]
                    .into_iter()
                    .map(String::from)
                    .collect::<Vec<_>>()
            ),
            (
                "journalctl".to_string(),
                vec![
                    "_SYSTEMD_INVOCATION_ID=xyz789".to_string(),
                    "--no-pager".to_string()
                ]
            ),
        ]
    );
}

#[tokio::test]
async fn test_ship_validation_failure() {
    let central = MockCentral::new(
        StatusCode::UNPROCESSABLE_ENTITY,
        r#"{"message":"validation failed","errors":{"class":["required"]}}"#,
    );
    let base_url = spawn_central(central.clone()).await;

    let runner = ScriptedRunner::default().with("journalctl", CommandOutput::success("line\n"));
    let outcome = shipper(runner, &base_url)
        .ship(&ship_request(InvocationTarget::Explicit("abc123".into())), &credential())
        .await
        .unwrap();

    match outcome {
        SubmissionOutcome::ApplicationError {
            status,
            message,
            errors,
        } => {
            assert_eq!(status, 422);
            assert_eq!(message, "validation failed");
            assert_eq!(errors["class"], vec!["required".to_string()]);
        }
        other => panic!("expected application error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ship_unauthenticated_with_bare_message() {
    let central = MockCentral::new(StatusCode::UNAUTHORIZED, r#"{"message":"Unauthenticated."}"#);
    let base_url = spawn_central(central.clone()).await;

    let runner = ScriptedRunner::default().with("journalctl", CommandOutput::success("line\n"));
    let err = shipper(runner, &base_url)
        .ship(&ship_request(InvocationTarget::Explicit("abc123".into())), &credential())
        .await
        .unwrap()
        .into_result()
        .unwrap_err();
    assert!(matches!(err, AgentError::Application { status: 401, .. }));
}

#[tokio::test]
async fn test_ship_undecodable_error_body() {
    let central = MockCentral::new(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
    let base_url = spawn_central(central.clone()).await;

    let runner = ScriptedRunner::default().with("journalctl", CommandOutput::success("line\n"));
    let err = shipper(runner, &base_url)
        .ship(&ship_request(InvocationTarget::Explicit("abc123".into())), &credential())
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Protocol { status: 502, .. }));
}

#[tokio::test]
async fn test_journal_failure_makes_no_http_call() {
    let central = MockCentral::new(StatusCode::OK, r#"{"message":"ok"}"#);
    let base_url = spawn_central(central.clone()).await;

    let runner =
        ScriptedRunner::default().with("journalctl", CommandOutput::failure(1, "no such unit"));
    let err = shipper(runner, &base_url)
        .ship(&ship_request(InvocationTarget::Explicit("abc123".into())), &credential())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Query(_)));
    assert!(err.to_string().contains("no such unit"));
    assert_eq!(central.hits(), 0);
}

#[tokio::test]
async fn test_unreachable_service_is_transport_outcome() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let runner = ScriptedRunner::default().with("journalctl", CommandOutput::success("line\n"));
    let outcome = shipper(runner, &base_url)
        .ship(&ship_request(InvocationTarget::Explicit("abc123".into())), &credential())
        .await
        .unwrap();
    assert!(matches!(outcome, SubmissionOutcome::TransportError(_)));
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_device_writes_token() {
    let central = MockCentral::new(
        StatusCode::OK,
        r#"{"success": true, "token": "someToken", "message": "Device registered successfully"}"#,
    );
    let base_url = spawn_central(central.clone()).await;

    let dir = TempDir::new().unwrap();
    let store = FileCredentialStore::new(dir.path());
    let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
    let registrar = DeviceRegistrar::new(transport, store.clone(), base_url);

    registrar
        .register(&RegistrationRequest {
            organisation_id: "someOrgID".to_string(),
            name: "someName".to_string(),
            organisation_password: "somePassword".to_string(),
            device_identifier: "0123456789abcdef".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(store.read().unwrap().token(), "someToken");

    let request = central.last();
    assert_eq!(request.path, "/api/devices/register/someOrgID");
    assert_eq!(request.query["name"], "someName");
    assert_eq!(request.query["organisationpassword"], "somePassword");
    assert_eq!(request.query["deviceidentifier"], "0123456789abcdef");
    assert!(!request.headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_register_device_rejected() {
    let central = MockCentral::new(
        StatusCode::FORBIDDEN,
        r#"{"message":"invalid organisation password","errors":{}}"#,
    );
    let base_url = spawn_central(central.clone()).await;

    let dir = TempDir::new().unwrap();
    let store = FileCredentialStore::new(dir.path());
    let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
    let registrar = DeviceRegistrar::new(transport, store.clone(), base_url);

    let err = registrar
        .register(&RegistrationRequest {
            organisation_id: "someOrgID".to_string(),
            name: "someName".to_string(),
            organisation_password: "wrong".to_string(),
            device_identifier: "0123456789abcdef".to_string(),
        })
        .await
        .unwrap_err();

    assert!(err.to_string().contains("invalid organisation password"));
    assert!(store.read().is_err());
}
