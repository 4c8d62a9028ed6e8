//! HTTP API tests: every route, driven through `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use pulse_config::ServerConfig;
use pulse_telemetry::TelemetryDispatcher;
use pulse_tools::{AgentTools, ToolRegistry};
use std::sync::Arc;

fn setup(api_key: Option<&str>) -> axum::Router {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(AgentTools::new(None)));
    let config = ServerConfig {
        api_key: api_key.map(str::to_string),
        ..Default::default()
    };
    pulse_server::build_router(config, registry, TelemetryDispatcher::disabled())
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn rpc(app: axum::Router, body: &str) -> (StatusCode, String) {
    let req = Request::post("/mcp")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    (status, body_string(resp).await)
}

async fn rpc_json(app: axum::Router, body: &str) -> Value {
    let (status, text) = rpc(app, body).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_str(&text).unwrap()
}

// ── Health & Metrics ───────────────────────────────────────────

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup(None);
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json: Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert!(json["uptime_secs"].is_number());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup(None);
    let req = Request::get("/metrics").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(ct.contains("text/plain"));
    let body = body_string(resp).await;
    assert!(body.contains("pulse_http_requests_total 1"));
    assert!(body.contains("pulse_telemetry_tracked_total 0"));
}

// ── Tools listing ──────────────────────────────────────────────

#[tokio::test]
async fn test_tools_endpoint() {
    let app = setup(None);
    let req = Request::get("/api/v1/tools").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json: Value = serde_json::from_str(&body_string(resp).await).unwrap();
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["planner_agent", "executor_agent"]);
}

// ── JSON-RPC ───────────────────────────────────────────────────

#[tokio::test]
async fn test_rpc_initialize() {
    let json = rpc_json(setup(None), r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#).await;
    assert_eq!(json["id"], 1);
    assert_eq!(json["result"]["serverInfo"]["name"], "pulse");
    assert!(json["result"]["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn test_rpc_ping() {
    let json = rpc_json(setup(None), r#"{"jsonrpc":"2.0","id":"p","method":"ping"}"#).await;
    assert_eq!(json["id"], "p");
    assert_eq!(json["result"], json!({}));
}

#[tokio::test]
async fn test_rpc_tools_list() {
    let json = rpc_json(setup(None), r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await;
    let tools = json["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0]["name"], "planner_agent");
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["task"]));
}

#[tokio::test]
async fn test_rpc_tools_call() {
    let json = rpc_json(
        setup(None),
        r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"planner_agent","arguments":{"task":"release"}}}"#,
    )
    .await;
    assert_eq!(json["result"]["isError"], false);
    assert_eq!(json["result"]["content"][0]["text"], "Planning task: release");
}

#[tokio::test]
async fn test_rpc_tool_failure_is_error_result() {
    let json = rpc_json(
        setup(None),
        r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"planner_agent","arguments":{}}}"#,
    )
    .await;
    assert!(json.get("error").is_none());
    assert_eq!(json["result"]["isError"], true);
    assert!(json["result"]["content"][0]["text"].as_str().unwrap().contains("task"));
}

#[tokio::test]
async fn test_rpc_unknown_tool() {
    let json = rpc_json(
        setup(None),
        r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"nope"}}"#,
    )
    .await;
    assert_eq!(json["error"]["code"], -32602);
}

#[tokio::test]
async fn test_rpc_unknown_method() {
    let json = rpc_json(setup(None), r#"{"jsonrpc":"2.0","id":6,"method":"resources/list"}"#).await;
    assert_eq!(json["error"]["code"], -32601);
}

#[tokio::test]
async fn test_rpc_malformed() {
    let json = rpc_json(setup(None), "{not json").await;
    assert_eq!(json["error"]["code"], -32700);
    assert_eq!(json["id"], Value::Null);

    let json = rpc_json(setup(None), r#"{"id":7,"method":"ping"}"#).await;
    assert_eq!(json["error"]["code"], -32600);
}

#[tokio::test]
async fn test_rpc_notification_accepted() {
    let (status, body) = rpc(
        setup(None),
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body.is_empty());
}

// ── Auth ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_api_key_required() {
    let app = setup(Some("s3cret"));
    let req = Request::get("/api/v1/tools").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = Request::get("/api/v1/tools")
        .header("authorization", "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let (status, _) = rpc(app.clone(), r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Health stays open.
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// ── Lifecycle telemetry ────────────────────────────────────────

#[tokio::test]
async fn test_bind_failure_is_error() {
    let config = ServerConfig {
        listen: "256.0.0.1:8000".into(),
        ..Default::default()
    };
    let err = pulse_server::start_server(
        config,
        ToolRegistry::new(),
        TelemetryDispatcher::disabled(),
        std::time::Duration::from_secs(1),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("failed to bind"));
}

#[tokio::test]
async fn test_lifecycle_events() {
    use pulse_telemetry::mock::MockTransport;
    use tokio::sync::oneshot;

    let transport = MockTransport::new();
    let telemetry = TelemetryDispatcher::builder()
        .endpoint("http://telemetry.test/events")
        .workers(1)
        .transport(Arc::new(transport.clone()))
        .build();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = ServerConfig {
        listen: "127.0.0.1:8123".into(),
        ..Default::default()
    };
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(pulse_server::serve(
        listener,
        config,
        ToolRegistry::new(),
        telemetry.clone(),
        std::time::Duration::from_secs(5),
        async {
            let _ = stop_rx.await;
        },
    ));

    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();

    assert_eq!(transport.event_types(), vec!["server.start", "server.stop"]);
    let requests = transport.requests();
    assert_eq!(
        requests[0].body["payload"],
        json!({"host": "127.0.0.1", "port": "8123"})
    );
    assert_eq!(requests[1].body["payload"], json!({}));

    // The pool was drained and closed by the server.
    telemetry.track("late", None);
    assert_eq!(telemetry.stats().dropped, 1);
}
