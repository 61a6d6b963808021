//! Integration tests for the MCP HTTP endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::api::{AppState, SESSION_ID_HEADER, create_router};
use crate::backend::ApiClient;
use crate::session::SessionRegistry;

struct TestApp {
    app: Router,
    sessions: Arc<SessionRegistry>,
    backend: MockServer,
}

/// Create a test app whose backend is a wiremock server
async fn test_app() -> TestApp {
    let backend = MockServer::start().await;
    let client = ApiClient::new(backend.uri()).unwrap();
    let sessions = Arc::new(SessionRegistry::new(CancellationToken::new()));
    let app = create_router(AppState::new(Arc::clone(&sessions), client));
    TestApp {
        app,
        sessions,
        backend,
    }
}

fn initialize_body() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "test", "version": "1.0"}
        }
    })
}

fn post(token: Option<&str>, session: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json")
        .header("accept", "application/json, text/event-stream");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    if let Some(session) = session {
        builder = builder.header(SESSION_ID_HEADER, session);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn bare(method: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri("/mcp");
    if let Some(session) = session {
        builder = builder.header(SESSION_ID_HEADER, session);
    }
    builder.body(Body::empty()).unwrap()
}

/// Helper to parse JSON response body
async fn json_body(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

/// Run the initialize handshake and return the new session id
async fn open_session(app: &Router, token: &str) -> String {
    let response = app
        .clone()
        .oneshot(post(Some(token), None, &initialize_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let session_id = response
        .headers()
        .get(SESSION_ID_HEADER)
        .expect("session id header")
        .to_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(post(
            Some(token),
            Some(&session_id),
            &json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    session_id
}

fn call_tool(id: u64, name: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": {}}
    })
}

fn tool_text(reply: &Value) -> Value {
    let text = reply["result"]["content"][0]["text"]
        .as_str()
        .expect("text content");
    serde_json::from_str(text).unwrap()
}

// =============================================================================
// GET /health
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn health_returns_static_status() {
    let test = test_app().await;

    let response = test
        .app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "superthread-mcp");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["authentication"].as_str().unwrap().contains("Bearer"));
}

// =============================================================================
// POST /mcp - authentication and session resolution
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn post_without_credential_is_unauthorized() {
    let test = test_app().await;

    let response = test
        .app
        .clone()
        .oneshot(post(None, None, &initialize_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], -32001);
    assert_eq!(
        body["error"]["message"],
        "Authorization header with Bearer token is required"
    );
    assert_eq!(body["id"], Value::Null);
    assert!(test.sessions.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn post_with_wrong_scheme_leaves_session_untouched() {
    let test = test_app().await;
    let session_id = open_session(&test.app, "t1").await;

    let response = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mcp")
                .header("authorization", "Basic dXNlcjpwYXNz")
                .header(SESSION_ID_HEADER, session_id.as_str())
                .body(Body::from(call_tool(2, "get_me").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(test.sessions.get(&session_id).is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn initialize_creates_session() {
    let test = test_app().await;

    let response = test
        .app
        .clone()
        .oneshot(post(Some("t1"), None, &initialize_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let session_id = response
        .headers()
        .get(SESSION_ID_HEADER)
        .expect("session id header")
        .to_str()
        .unwrap()
        .to_string();
    assert!(!session_id.is_empty());

    let body = json_body(response).await;
    assert_eq!(body["id"], 1);
    assert!(body["result"]["protocolVersion"].is_string());
    assert!(body["result"]["capabilities"]["tools"].is_object());

    assert_eq!(test.sessions.len(), 1);
    assert!(test.sessions.get(&session_id).is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn non_initialize_without_session_is_rejected() {
    let test = test_app().await;

    let response = test
        .app
        .clone()
        .oneshot(post(Some("t1"), None, &call_tool(1, "get_me")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], -32000);
    assert_eq!(
        body["error"]["message"],
        "Bad Request: No valid session ID provided"
    );
    assert!(test.sessions.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_session_id_is_rejected() {
    let test = test_app().await;

    let response = test
        .app
        .clone()
        .oneshot(post(Some("t1"), Some("no-such-session"), &call_tool(1, "get_me")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["message"], "Invalid or missing session ID");
    assert!(test.sessions.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_body_on_live_session_is_parse_error() {
    let test = test_app().await;
    let session_id = open_session(&test.app, "t1").await;

    let response = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mcp")
                .header("authorization", "Bearer t1")
                .header(SESSION_ID_HEADER, session_id.as_str())
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], -32700);
    assert!(
        body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Parse error: ")
    );
    // A bad message does not end the session
    assert!(test.sessions.get(&session_id).is_some());
}

// =============================================================================
// Tool calls through a session
// =============================================================================

/// Test the full initialize → initialized → tools/call flow
///
/// This test verifies:
/// - The backend sees the token bound at initialize
/// - The tool's JSON comes back as text content
/// - A later request with a different token still uses the bound token
#[tokio::test(flavor = "multi_thread")]
async fn tool_call_uses_token_bound_at_initialize() {
    let test = test_app().await;
    let profile = json!({"user": {"id": "u1", "teams": [{"id": "team1"}]}});
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile.clone()))
        .expect(2)
        .mount(&test.backend)
        .await;

    let session_id = open_session(&test.app, "t1").await;

    let response = test
        .app
        .clone()
        .oneshot(post(Some("t1"), Some(&session_id), &call_tool(2, "get_me")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let reply = json_body(response).await;
    assert_eq!(reply["id"], 2);
    assert_eq!(tool_text(&reply), profile);

    let response = test
        .app
        .clone()
        .oneshot(post(Some("t2"), Some(&session_id), &call_tool(3, "get_me")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let reply = json_body(response).await;
    assert_eq!(tool_text(&reply), profile);
}

#[tokio::test(flavor = "multi_thread")]
async fn backend_failure_is_tool_error_not_transport_error() {
    let test = test_app().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
        .mount(&test.backend)
        .await;

    let session_id = open_session(&test.app, "t1").await;
    let response = test
        .app
        .clone()
        .oneshot(post(Some("t1"), Some(&session_id), &call_tool(2, "get_me")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let reply = json_body(response).await;
    assert_eq!(reply["result"]["isError"], true);
    assert_eq!(
        reply["result"]["content"][0]["text"],
        "API request failed: 401 Unauthorized - bad token"
    );
    assert!(test.sessions.get(&session_id).is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn event_stream_only_client_gets_sse_reply() {
    let test = test_app().await;
    let session_id = open_session(&test.app, "t1").await;

    let response = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mcp")
                .header("authorization", "Bearer t1")
                .header("accept", "text/event-stream")
                .header(SESSION_ID_HEADER, session_id.as_str())
                .body(Body::from(
                    json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("event: message"));
    let data = text
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .expect("data line");
    let reply: Value = serde_json::from_str(data).unwrap();
    assert_eq!(reply["id"], 7);
    assert!(reply["result"]["tools"].as_array().unwrap().len() >= 13);
}

#[tokio::test(flavor = "multi_thread")]
async fn session_id_header_is_exposed_to_browsers() {
    let test = test_app().await;

    let mut request = post(Some("t1"), None, &initialize_body());
    request
        .headers_mut()
        .insert("origin", "http://example.test".parse().unwrap());
    let response = test.app.clone().oneshot(request).await.unwrap();

    let exposed = response.headers()["access-control-expose-headers"]
        .to_str()
        .unwrap()
        .to_lowercase();
    assert!(exposed.contains(SESSION_ID_HEADER));
}

// =============================================================================
// GET / DELETE /mcp
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn get_without_session_id_is_rejected() {
    let test = test_app().await;

    let response = test.app.oneshot(bare("GET", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(
        body.to_string().contains("Invalid or missing session ID"),
        "body was {body}"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_with_unknown_session_is_rejected() {
    let test = test_app().await;

    let response = test
        .app
        .oneshot(bare("DELETE", Some("no-such-session")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_closes_and_evicts_session() {
    let test = test_app().await;
    let session_id = open_session(&test.app, "t1").await;

    let response = test
        .app
        .clone()
        .oneshot(bare("DELETE", Some(&session_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(test.sessions.is_empty());

    let response = test
        .app
        .clone()
        .oneshot(bare("DELETE", Some(&session_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = test
        .app
        .clone()
        .oneshot(post(Some("t1"), Some(&session_id), &call_tool(2, "get_me")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn event_stream_ends_when_session_closes() {
    let test = test_app().await;
    let session_id = open_session(&test.app, "t1").await;

    let stream = test
        .app
        .clone()
        .oneshot(bare("GET", Some(&session_id)))
        .await
        .unwrap();
    assert_eq!(stream.status(), StatusCode::OK);
    assert!(
        stream.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let response = test
        .app
        .clone()
        .oneshot(bare("DELETE", Some(&session_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let drained =
        tokio::time::timeout(Duration::from_secs(5), stream.into_body().collect()).await;
    assert!(drained.is_ok(), "event stream should end after DELETE");
}

#[tokio::test(flavor = "multi_thread")]
async fn dropping_event_stream_keeps_session() {
    let test = test_app().await;
    let session_id = open_session(&test.app, "t1").await;

    let response = test
        .app
        .clone()
        .oneshot(bare("GET", Some(&session_id)))
        .await
        .unwrap();
    drop(response);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(test.sessions.get(&session_id).is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_closes_live_sessions() {
    let test = test_app().await;
    open_session(&test.app, "t1").await;
    open_session(&test.app, "t2").await;
    assert_eq!(test.sessions.len(), 2);

    tokio::time::timeout(Duration::from_secs(5), test.sessions.shutdown())
        .await
        .expect("shutdown completes");

    assert!(test.sessions.is_empty());
}
