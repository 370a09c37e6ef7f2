//! Integration tests for the Jira REST tracker.
//!
//! Each test spins up a fake Jira (Axum on a random port) and drives the
//! real `JiraTracker` against it, checking request shape and status
//! handling.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use mail_ticket_bridge::config::TrackerConfig;
use mail_ticket_bridge::error::TrackerError;
use mail_ticket_bridge::sync::{Classification, SubjectClassifier, TicketKey};
use mail_ticket_bridge::tracker::{IssueLookup, JiraTracker, PayloadTemplate, Tracker};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const NEW_ISSUE: &str = r#"{"fields":{"project":{"key":"OPS"},"summary":"%SUMMARY%","description":"%DESCRIPTION%","issuetype":{"name":"Task"}}}"#;
const ADD_COMMENT: &str = r#"{"body":"%SUMMARY%\n\n%DESCRIPTION%"}"#;

/// `bot:pw`, base64-encoded.
const BASIC_AUTH: &str = "Basic Ym90OnB3";

// ── Fake Jira ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Recorded {
    route: String,
    /// Raw request path as received, still percent-encoded.
    path: String,
    authorization: Option<String>,
    atlassian_token: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

impl Recorded {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body is not JSON")
    }
}

#[derive(Clone, Default)]
struct FakeJira {
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeJira {
    fn record(&self, route: String, uri: &Uri, headers: &HeaderMap, body: &[u8]) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.requests.lock().unwrap().push(Recorded {
            route,
            path: uri.path().to_string(),
            authorization: header("authorization"),
            atlassian_token: header("x-atlassian-token"),
            content_type: header("content-type"),
            body: body.to_vec(),
        });
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn create_issue(State(jira): State<FakeJira>, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    jira.record("POST /issue".into(), &uri, &headers, &body);
    let summary = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| v["fields"]["summary"].as_str().map(str::to_string))
        .unwrap_or_default();

    match summary.as_str() {
        "reject me" => (StatusCode::BAD_REQUEST, r#"{"errors":{"summary":"bad"}}"#).into_response(),
        "keyless" => (StatusCode::CREATED, axum::Json(json!({"id": "10001"}))).into_response(),
        "wrong status" => (StatusCode::OK, axum::Json(json!({"key": "OPS-1"}))).into_response(),
        _ => (
            StatusCode::CREATED,
            axum::Json(json!({"id": "10101", "key": "OPS-101", "self": "http://jira/issue/10101"})),
        )
            .into_response(),
    }
}

async fn get_issue(
    State(jira): State<FakeJira>,
    Path(key): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    jira.record(format!("GET /issue/{key}"), &uri, &headers, &[]);
    match key.as_str() {
        "OPS-9" => (StatusCode::OK, axum::Json(json!({"key": "OPS-9"}))).into_response(),
        "BOOM-1" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        _ => (StatusCode::NOT_FOUND, r#"{"errorMessages":["Issue does not exist"]}"#).into_response(),
    }
}

async fn add_comment(
    State(jira): State<FakeJira>,
    Path(key): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    jira.record(format!("POST /issue/{key}/comment"), &uri, &headers, &body);
    if key == "LOCKED-1" {
        return (StatusCode::FORBIDDEN, "issue is closed").into_response();
    }
    (StatusCode::CREATED, axum::Json(json!({"id": "20001"}))).into_response()
}

async fn add_attachment(
    State(jira): State<FakeJira>,
    Path(key): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    jira.record(format!("POST /issue/{key}/attachments"), &uri, &headers, &body);
    if headers.get("x-atlassian-token").is_none() {
        return (StatusCode::FORBIDDEN, "XSRF check failed").into_response();
    }
    (StatusCode::OK, axum::Json(json!([{"filename": "x"}]))).into_response()
}

/// Anything outside the Jira routes.
async fn stray(State(jira): State<FakeJira>, uri: Uri, headers: HeaderMap) -> Response {
    jira.record("STRAY".into(), &uri, &headers, &[]);
    (StatusCode::OK, axum::Json(json!({"key": "STRAY-1"}))).into_response()
}

/// Start a fake Jira on a random port, return (tracker, recorded requests).
async fn start_server() -> (JiraTracker, FakeJira) {
    let jira = FakeJira::default();
    let app = Router::new()
        .route("/rest/api/2/issue", post(create_issue))
        .route("/rest/api/2/issue/{key}", get(get_issue))
        .route("/rest/api/2/issue/{key}/comment", post(add_comment))
        .route("/rest/api/2/issue/{key}/attachments", post(add_attachment))
        .fallback(stray)
        .with_state(jira.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let config = TrackerConfig {
        base_url: format!("http://127.0.0.1:{port}"),
        username: "bot".into(),
        password: SecretString::from("pw"),
        api_version: "2".into(),
        new_issue_template: String::new(),
        add_comment_template: String::new(),
    };
    let tracker = JiraTracker::new(
        &config,
        PayloadTemplate::new(NEW_ISSUE).unwrap(),
        PayloadTemplate::new(ADD_COMMENT).unwrap(),
    );

    (tracker, jira)
}

fn key(value: &str) -> TicketKey {
    TicketKey::parse(value).unwrap()
}

// ── Create ──────────────────────────────────────────────────────────

#[tokio::test]
async fn create_returns_key_from_response() {
    timeout(TEST_TIMEOUT, async {
        let (tracker, jira) = start_server().await;

        let created = tracker
            .create_issue("Login \"broken\"", "It crashes on start\n")
            .await
            .unwrap();
        assert_eq!(created.as_str(), "OPS-101");

        let requests = jira.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.route, "POST /issue");
        assert_eq!(request.authorization.as_deref(), Some(BASIC_AUTH));
        assert_eq!(request.content_type.as_deref(), Some("application/json"));

        let body = request.json();
        assert_eq!(body["fields"]["summary"], "Login \"broken\"");
        assert_eq!(body["fields"]["description"], "It crashes on start");
        assert_eq!(body["fields"]["project"]["key"], "OPS");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn create_rejection_keeps_status_and_body() {
    timeout(TEST_TIMEOUT, async {
        let (tracker, _jira) = start_server().await;

        let err = tracker.create_issue("reject me", "x").await.unwrap_err();
        match err {
            TrackerError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("summary"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn create_requires_exactly_201() {
    timeout(TEST_TIMEOUT, async {
        let (tracker, _jira) = start_server().await;

        let err = tracker.create_issue("wrong status", "x").await.unwrap_err();
        assert!(matches!(err, TrackerError::Rejected { status: 200, .. }));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn create_without_key_is_invalid_response() {
    timeout(TEST_TIMEOUT, async {
        let (tracker, _jira) = start_server().await;

        let err = tracker.create_issue("keyless", "x").await.unwrap_err();
        assert!(matches!(err, TrackerError::InvalidResponse(_)));
    })
    .await
    .expect("test timed out");
}

// ── Lookup ──────────────────────────────────────────────────────────

#[tokio::test]
async fn lookup_maps_200_and_404() {
    timeout(TEST_TIMEOUT, async {
        let (tracker, jira) = start_server().await;

        assert_eq!(tracker.get_issue(&key("OPS-9")).await.unwrap(), IssueLookup::Exists);
        assert_eq!(tracker.get_issue(&key("OPS-404")).await.unwrap(), IssueLookup::NotFound);

        let routes: Vec<String> = jira.requests().into_iter().map(|r| r.route).collect();
        assert_eq!(routes, vec!["GET /issue/OPS-9", "GET /issue/OPS-404"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn lookup_server_error_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let (tracker, _jira) = start_server().await;

        let err = tracker.get_issue(&key("BOOM-1")).await.unwrap_err();
        assert!(matches!(err, TrackerError::Rejected { status: 500, .. }));
    })
    .await
    .expect("test timed out");
}

// ── Comment ─────────────────────────────────────────────────────────

#[tokio::test]
async fn comment_renders_summary_and_description() {
    timeout(TEST_TIMEOUT, async {
        let (tracker, jira) = start_server().await;

        tracker
            .add_comment(&key("OPS-9"), "Re: update [OPS-9] (ops@example.com)", "  Deployed.  ")
            .await
            .unwrap();

        let requests = jira.requests();
        assert_eq!(requests[0].route, "POST /issue/OPS-9/comment");
        assert_eq!(
            requests[0].json()["body"],
            "Re: update [OPS-9] (ops@example.com)\n\nDeployed."
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn comment_rejection_is_an_error() {
    timeout(TEST_TIMEOUT, async {
        let (tracker, _jira) = start_server().await;

        let err = tracker.add_comment(&key("LOCKED-1"), "s", "d").await.unwrap_err();
        assert!(matches!(err, TrackerError::Rejected { status: 403, .. }));
    })
    .await
    .expect("test timed out");
}

// ── Attachments ─────────────────────────────────────────────────────

#[tokio::test]
async fn attachment_is_multipart_with_xsrf_header() {
    timeout(TEST_TIMEOUT, async {
        let (tracker, jira) = start_server().await;

        tracker
            .add_attachment(&key("OPS-9"), "trace.log", b"stack trace here")
            .await
            .unwrap();

        let requests = jira.requests();
        let request = &requests[0];
        assert_eq!(request.route, "POST /issue/OPS-9/attachments");
        assert_eq!(request.atlassian_token.as_deref(), Some("no-check"));
        assert_eq!(request.authorization.as_deref(), Some(BASIC_AUTH));
        assert!(
            request
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.starts_with("multipart/form-data"))
        );

        let body = String::from_utf8_lossy(&request.body);
        assert!(body.contains(r#"name="file""#));
        assert!(body.contains(r#"filename="trace.log""#));
        assert!(body.contains("stack trace here"));
    })
    .await
    .expect("test timed out");
}

// ── Keys from mail subjects ─────────────────────────────────────────

#[tokio::test]
async fn subject_key_cannot_escape_the_issue_path() {
    timeout(TEST_TIMEOUT, async {
        let (tracker, jira) = start_server().await;

        let subject = "Re: hi [../../../../admin/secret?token=1#x/OPS-1]";
        let Classification::Reply { ticket_key } = SubjectClassifier::new().classify(subject) else {
            panic!("expected {subject:?} to classify as a reply");
        };

        assert_eq!(tracker.get_issue(&ticket_key).await.unwrap(), IssueLookup::NotFound);
        tracker.add_comment(&ticket_key, "s", "d").await.unwrap();
        tracker.add_attachment(&ticket_key, "a.txt", b"a").await.unwrap();

        let requests = jira.requests();
        assert_eq!(requests.len(), 3);
        for request in &requests {
            assert_ne!(request.route, "STRAY", "request escaped to {}", request.path);
            assert!(request.path.starts_with("/rest/api/2/issue/"), "{}", request.path);
        }

        let key = ticket_key.as_str();
        assert_eq!(requests[0].route, format!("GET /issue/{key}"));
        assert_eq!(requests[1].route, format!("POST /issue/{key}/comment"));
        assert_eq!(requests[2].route, format!("POST /issue/{key}/attachments"));
    })
    .await
    .expect("test timed out");
}
