use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive},
    response::{IntoResponse, Response, Sse},
    Json,
};
use serde_json::Value;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use tally_core::{evaluate, Error};
use tally_mcp::jsonrpc::{self, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND};
use tally_mcp::session::PeerCapabilities;
use tally_mcp::{JsonRpcRequest, JsonRpcResponse, Orchestrator, ToolRegistry};

use crate::app_state::AppState;

/// SSE stream carrying server-to-client traffic: responses, sampling
/// requests, and logging notifications.
///
/// Per the MCP SSE transport:
/// 1. Server sends `event: endpoint` with the POST URL
/// 2. Client POSTs JSON-RPC to that URL
/// 3. Server-initiated frames arrive as `event: message`
pub async fn mcp_sse(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    tracing::info!("client connected via MCP SSE");

    let rx = state.sessions.channel().subscribe();

    let init_stream = tokio_stream::once(Ok(Event::default().event("endpoint").data("/mcp")));

    let event_stream = BroadcastStream::new(rx).filter_map(|result| {
        result.ok().map(|frame| {
            Ok(Event::default()
                .event("message")
                .json_data(&*frame)
                .unwrap_or_else(|_| Event::default().data("error serializing frame")))
        })
    });

    Sse::new(init_stream.chain(event_stream)).keep_alive(KeepAlive::default())
}

/// Handle an inbound MCP frame: a request directed at the server, a
/// notification, or the client's response to a server-initiated
/// request (the sampling reply path).
pub async fn mcp_request(State(state): State<AppState>, Json(frame): Json<Value>) -> Response {
    // Responses to our own requests are matched by id, never answered.
    if jsonrpc::is_response(&frame) {
        route_client_response(&state, &frame);
        return StatusCode::ACCEPTED.into_response();
    }

    let req: JsonRpcRequest = match serde_json::from_value(frame) {
        Ok(req) => req,
        Err(e) => {
            return Json(JsonRpcResponse::error(
                Value::Null,
                jsonrpc::INVALID_REQUEST,
                format!("invalid request: {e}"),
            ))
            .into_response();
        }
    };

    // Notifications (no id) get no response.
    if req.id.is_null() {
        tracing::debug!("received MCP notification: {}", req.method);
        return StatusCode::ACCEPTED.into_response();
    }

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(&state, &req),
        "ping" => JsonRpcResponse::success(req.id.clone(), serde_json::json!({})),
        "tools/list" => handle_tools_list(&req),
        "tools/call" => handle_tools_call(&state, &req).await,
        _ => JsonRpcResponse::error(req.id, METHOD_NOT_FOUND, "Method not found"),
    };

    Json(response).into_response()
}

/// Deliver a client reply to whichever pending request it answers.
fn route_client_response(state: &AppState, frame: &Value) {
    let Some(id) = frame.get("id").and_then(Value::as_str) else {
        tracing::warn!("client response without a string id, dropping");
        return;
    };

    let reply = if let Some(err) = frame.get("error") {
        let code = err
            .get("code")
            .and_then(Value::as_i64)
            .and_then(|code| i32::try_from(code).ok())
            .unwrap_or(INTERNAL_ERROR);
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        Err(tally_mcp::SessionError::Remote { code, message })
    } else {
        Ok(frame.get("result").cloned().unwrap_or(Value::Null))
    };

    state.sessions.channel().complete(id, reply);
}

fn handle_initialize(state: &AppState, req: &JsonRpcRequest) -> JsonRpcResponse {
    let peer = req
        .params
        .as_ref()
        .map(PeerCapabilities::from_negotiation)
        .unwrap_or_default();
    tracing::info!("client initialized (sampling: {})", peer.sampling);
    state.sessions.record_capabilities(peer);

    JsonRpcResponse::success(
        req.id.clone(),
        serde_json::json!({
            "protocolVersion": tally_mcp::session::PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "logging": {}
            },
            "serverInfo": {
                "name": "tally",
                "version": env!("CARGO_PKG_VERSION")
            }
        }),
    )
}

fn handle_tools_list(req: &JsonRpcRequest) -> JsonRpcResponse {
    let tools = ToolRegistry::definitions();
    JsonRpcResponse::success(req.id.clone(), serde_json::json!({ "tools": tools }))
}

/// A tool failure with its JSON-RPC error class already decided.
struct ToolError {
    code: i32,
    message: String,
}

impl ToolError {
    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: message.into(),
        }
    }
}

impl From<Error> for ToolError {
    fn from(err: Error) -> Self {
        let code = if err.is_validation() {
            INVALID_PARAMS
        } else {
            INTERNAL_ERROR
        };
        Self {
            code,
            message: err.to_string(),
        }
    }
}

async fn handle_tools_call(state: &AppState, req: &JsonRpcRequest) -> JsonRpcResponse {
    let Some(params) = &req.params else {
        return JsonRpcResponse::error(req.id.clone(), INVALID_PARAMS, "Missing params");
    };

    let tool_name = params
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let arguments = params
        .get("arguments")
        .cloned()
        .unwrap_or(Value::Object(serde_json::Map::new()));

    let result = match tool_name {
        "add" | "subtract" | "multiply" | "divide" => {
            tool_arithmetic(tool_name, &arguments)
        }
        "convert_currency" => tool_convert_currency(state, &arguments).await,
        "get_exchange_rate" => tool_get_exchange_rate(state, &arguments).await,
        "calculate_with_explanation" => tool_calculate_with_explanation(state, &arguments).await,
        "calculate_with_exchange_rate" => {
            tool_calculate_with_exchange_rate(state, &arguments).await
        }
        _ => Err(ToolError::invalid_params(format!(
            "Unknown tool: {tool_name}"
        ))),
    };

    match result {
        Ok(text) => JsonRpcResponse::success(
            req.id.clone(),
            serde_json::json!({
                "content": [{ "type": "text", "text": text }]
            }),
        ),
        Err(err) => JsonRpcResponse::error(req.id.clone(), err.code, err.message),
    }
}

fn require_number(args: &Value, name: &str) -> Result<f64, ToolError> {
    args.get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolError::invalid_params(format!("Missing '{name}' parameter")))
}

fn require_str<'a>(args: &'a Value, name: &str) -> Result<&'a str, ToolError> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::invalid_params(format!("Missing '{name}' parameter")))
}

fn tool_arithmetic(operation: &str, args: &Value) -> Result<String, ToolError> {
    let a = require_number(args, "a")?;
    let b = require_number(args, "b")?;
    let result = evaluate(a, b, operation)?;
    Ok(result.value.to_string())
}

async fn tool_convert_currency(state: &AppState, args: &Value) -> Result<String, ToolError> {
    let amount = require_number(args, "amount")?;
    let from = require_str(args, "from")?;
    let to = require_str(args, "to")?;

    let converted = state.resolver.convert(amount, from, to).await?;
    Ok(converted.to_string())
}

async fn tool_get_exchange_rate(state: &AppState, args: &Value) -> Result<String, ToolError> {
    let from = require_str(args, "from")?;
    let to = require_str(args, "to")?;

    let quote = state.resolver.resolve(from, to).await?;
    Ok(quote.rate.to_string())
}

async fn tool_calculate_with_explanation(
    state: &AppState,
    args: &Value,
) -> Result<String, ToolError> {
    let a = require_number(args, "a")?;
    let b = require_number(args, "b")?;
    let operation = require_str(args, "operation")?;

    let result = evaluate(a, b, operation)?;

    let session = Arc::new(state.sessions.open_session());
    let orchestrator = Orchestrator::new(session, state.sampling.clone());
    let artifact = orchestrator.explain(&result, None).await;

    Ok(artifact.render())
}

async fn tool_calculate_with_exchange_rate(
    state: &AppState,
    args: &Value,
) -> Result<String, ToolError> {
    let a = require_number(args, "a")?;
    let b = require_number(args, "b")?;
    let operation = require_str(args, "operation")?;
    let from = require_str(args, "from")?;
    let to = require_str(args, "to")?;

    let result = evaluate(a, b, operation)?;
    let quote = state.resolver.resolve(from, to).await?;

    let session = Arc::new(state.sessions.open_session());
    let orchestrator = Orchestrator::new(session, state.sampling.clone());
    let artifact = orchestrator.explain(&result, Some(&quote)).await;

    Ok(artifact.render())
}
