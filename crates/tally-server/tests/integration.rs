use std::sync::Arc;

use axum_test::TestServer;

use tally_core::ModelHint;
use tally_mcp::SamplingConfig;
use tally_rates::RateResolver;
use tally_server::session::SessionManager;

use mock_rates::MockRateSource;

fn build_test_app() -> (TestServer, Arc<MockRateSource>) {
    let source = MockRateSource::new();

    let state = tally_server::app_state::AppState {
        resolver: RateResolver::new(source.clone()),
        sessions: Arc::new(SessionManager::new()),
        sampling: SamplingConfig {
            hints: vec![ModelHint::new("openai"), ModelHint::new("github")],
            per_hint_deadline: None,
        },
    };

    let app = tally_server::router::create_router(state);
    (TestServer::new(app).unwrap(), source)
}

fn rpc(method: &str, params: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params
    })
}

fn call(name: &str, arguments: serde_json::Value) -> serde_json::Value {
    rpc("tools/call", serde_json::json!({ "name": name, "arguments": arguments }))
}

fn content_text(body: &serde_json::Value) -> &str {
    body["result"]["content"][0]["text"].as_str().unwrap()
}

#[tokio::test]
async fn health_check() {
    let (server, _) = build_test_app();
    let resp = server.get("/health").await;
    resp.assert_status_ok();
}

#[tokio::test]
async fn mcp_initialize() {
    let (server, _) = build_test_app();

    let resp = server
        .post("/mcp")
        .json(&rpc(
            "initialize",
            serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": { "sampling": {} },
                "clientInfo": { "name": "test", "version": "0.0.0" }
            }),
        ))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["result"]["serverInfo"]["name"], "tally");
    assert!(body["result"]["capabilities"].get("tools").is_some());
}

#[tokio::test]
async fn mcp_ping() {
    let (server, _) = build_test_app();

    let resp = server.post("/mcp").json(&rpc("ping", serde_json::json!({}))).await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn mcp_tools_list() {
    let (server, _) = build_test_app();

    let resp = server
        .post("/mcp")
        .json(&rpc("tools/list", serde_json::json!({})))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    let tools = body["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 8);
}

#[tokio::test]
async fn mcp_unknown_method() {
    let (server, _) = build_test_app();

    let resp = server
        .post("/mcp")
        .json(&rpc("nonexistent/method", serde_json::json!({})))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], -32601);
}

#[tokio::test]
async fn mcp_notification_returns_accepted() {
    let (server, _) = build_test_app();

    let resp = server
        .post("/mcp")
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))
        .await;

    resp.assert_status(axum::http::StatusCode::ACCEPTED);
}

#[tokio::test]
async fn add_tool() {
    let (server, _) = build_test_app();

    let resp = server
        .post("/mcp")
        .json(&call("add", serde_json::json!({ "a": 15.0, "b": 27.0 })))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(content_text(&body), "42");
}

#[tokio::test]
async fn divide_by_zero_is_client_error() {
    let (server, _) = build_test_app();

    let resp = server
        .post("/mcp")
        .json(&call("divide", serde_json::json!({ "a": 5.0, "b": 0.0 })))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], -32602);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("division by zero"));
}

#[tokio::test]
async fn unsupported_operation_is_client_error() {
    let (server, _) = build_test_app();

    let resp = server
        .post("/mcp")
        .json(&call(
            "calculate_with_explanation",
            serde_json::json!({ "a": 1.0, "b": 2.0, "operation": "modulo" }),
        ))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], -32602);
}

#[tokio::test]
async fn missing_parameter_is_client_error() {
    let (server, _) = build_test_app();

    let resp = server
        .post("/mcp")
        .json(&call("add", serde_json::json!({ "a": 1.0 })))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], -32602);
    assert!(body["error"]["message"].as_str().unwrap().contains("'b'"));
}

#[tokio::test]
async fn unknown_tool_is_client_error() {
    let (server, _) = build_test_app();

    let resp = server
        .post("/mcp")
        .json(&call("launch_rockets", serde_json::json!({})))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], -32602);
}

#[tokio::test]
async fn convert_currency() {
    let (server, source) = build_test_app();

    let resp = server
        .post("/mcp")
        .json(&call(
            "convert_currency",
            serde_json::json!({ "amount": 100.0, "from": "USD", "to": "EUR" }),
        ))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(content_text(&body), "90");
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn same_currency_conversion_skips_lookup() {
    let (server, source) = build_test_app();

    let resp = server
        .post("/mcp")
        .json(&call(
            "convert_currency",
            serde_json::json!({ "amount": 100.0, "from": "USD", "to": "usd" }),
        ))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(content_text(&body), "100");
    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn negative_amount_is_client_error() {
    let (server, source) = build_test_app();

    let resp = server
        .post("/mcp")
        .json(&call(
            "convert_currency",
            serde_json::json!({ "amount": -1.0, "from": "USD", "to": "EUR" }),
        ))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], -32602);
    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn get_exchange_rate() {
    let (server, _) = build_test_app();

    let resp = server
        .post("/mcp")
        .json(&call(
            "get_exchange_rate",
            serde_json::json!({ "from": "USD", "to": "GBP" }),
        ))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(content_text(&body), "0.79");
}

#[tokio::test]
async fn explanation_without_client_reports_unavailability() {
    let (server, _) = build_test_app();

    // No client has initialized with the sampling capability, so both
    // configured hints must report unavailability; the numeric result
    // still leads the document and no section is dropped.
    let resp = server
        .post("/mcp")
        .json(&call(
            "calculate_with_explanation",
            serde_json::json!({ "a": 15.0, "b": 27.0, "operation": "add" }),
        ))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    let text = content_text(&body);

    assert!(text.contains("**15 + 27 = 42**"));
    assert!(text.contains("## openai"));
    assert!(text.contains("## github"));
    assert_eq!(text.matches("sampling capability not available").count(), 2);
}

#[tokio::test]
async fn calculate_with_exchange_rate_resolves_a_quote() {
    let (server, source) = build_test_app();

    // The quote is resolved before sampling and annotates the prompt;
    // with no sampling-capable client both sections report
    // unavailability, but the document and the rate lookup still happen.
    let resp = server
        .post("/mcp")
        .json(&call(
            "calculate_with_exchange_rate",
            serde_json::json!({
                "a": 15.0, "b": 27.0, "operation": "add",
                "from": "USD", "to": "EUR"
            }),
        ))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    let text = content_text(&body);

    assert!(text.contains("**15 + 27 = 42**"));
    assert!(text.contains("## openai"));
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn calculate_with_exchange_rate_rejects_bad_currency() {
    let (server, source) = build_test_app();

    let resp = server
        .post("/mcp")
        .json(&call(
            "calculate_with_exchange_rate",
            serde_json::json!({
                "a": 1.0, "b": 2.0, "operation": "add",
                "from": "USD", "to": "   "
            }),
        ))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], -32602);
    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn client_response_frame_returns_accepted() {
    let (server, _) = build_test_app();

    // A sampling reply for a request nobody is waiting on is accepted
    // and dropped.
    let resp = server
        .post("/mcp")
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "id": "stale-request-id",
            "result": { "content": { "type": "text", "text": "too late" } }
        }))
        .await;

    resp.assert_status(axum::http::StatusCode::ACCEPTED);
}
