use reqwest::Client;
use reqwest_eventsource::{Event, EventSource};
use serde_json::Value;
use tokio_stream::StreamExt;

use tally_mcp::session::{METHOD_CREATE_MESSAGE, METHOD_LOG_MESSAGE, METHOD_PING};
use tally_mcp::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// How the client services sampling requests.
pub enum BackendMode {
    /// Echo the prompt back (for testing without any model).
    Mock,
    /// Route by model hint to OpenAI-compatible endpoints: "ollama"
    /// goes to the local Ollama URL, everything else to the default.
    Llm {
        default_url: String,
        ollama_url: String,
        model: String,
    },
}

/// Run the sampling client: initialize against the server, connect to
/// its SSE stream, and answer sampling requests as they arrive.
pub async fn run(server_url: &str, mode: BackendMode) -> anyhow::Result<()> {
    let http = Client::new();

    // Step 1: initialize, advertising the sampling capability.
    let init = JsonRpcRequest::new(
        uuid::Uuid::new_v4().to_string(),
        "initialize",
        Some(serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": { "sampling": {} },
            "clientInfo": { "name": "tally-cli", "version": env!("CARGO_PKG_VERSION") }
        })),
    );
    let resp: Value = http
        .post(format!("{server_url}/mcp"))
        .json(&init)
        .send()
        .await?
        .json()
        .await?;

    if let Some(error) = resp.get("error") {
        anyhow::bail!("initialize failed: {error}");
    }
    tracing::info!(
        "connected to {} v{}",
        resp["result"]["serverInfo"]["name"].as_str().unwrap_or("?"),
        resp["result"]["serverInfo"]["version"].as_str().unwrap_or("?"),
    );

    let initialized = JsonRpcNotification::new("notifications/initialized", None);
    let _ = http
        .post(format!("{server_url}/mcp"))
        .json(&initialized)
        .send()
        .await;

    // Step 2: listen for server-initiated frames.
    let sse_url = format!("{server_url}/mcp/sse");
    tracing::info!("listening for sampling requests on {sse_url}");
    let mut es = EventSource::get(&sse_url);

    while let Some(event) = es.next().await {
        match event {
            Ok(Event::Open) => {
                tracing::info!("SSE connection established");
            }
            Ok(Event::Message(msg)) => {
                if msg.event == "endpoint" {
                    continue;
                }

                let frame: Value = match serde_json::from_str(&msg.data) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!("failed to parse frame: {e}");
                        continue;
                    }
                };

                handle_frame(&http, server_url, &mode, &frame).await;
            }
            Err(err) => {
                tracing::error!("SSE error: {err}");
                // Attempt reconnect after a delay
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
        }
    }

    Ok(())
}

async fn handle_frame(http: &Client, server_url: &str, mode: &BackendMode, frame: &Value) {
    let method = frame.get("method").and_then(Value::as_str).unwrap_or("");

    match method {
        METHOD_CREATE_MESSAGE => {
            let id = frame.get("id").cloned().unwrap_or(Value::Null);
            let params = frame.get("params").cloned().unwrap_or(Value::Null);

            let response = match generate(http, mode, &params).await {
                Ok(text) => JsonRpcResponse::success(
                    id,
                    serde_json::json!({
                        "role": "assistant",
                        "content": { "type": "text", "text": text },
                        "model": "tally-cli"
                    }),
                ),
                Err(e) => {
                    tracing::warn!("sampling request failed: {e}");
                    JsonRpcResponse::error(id, -32603, e.to_string())
                }
            };

            post_frame(http, server_url, &response).await;
        }
        METHOD_PING => {
            let id = frame.get("id").cloned().unwrap_or(Value::Null);
            let response = JsonRpcResponse::success(id, serde_json::json!({}));
            post_frame(http, server_url, &response).await;
        }
        METHOD_LOG_MESSAGE => {
            let params = frame.get("params").cloned().unwrap_or(Value::Null);
            println!(
                "MCP LOGGING: [{}] {}",
                params["level"].as_str().unwrap_or("?"),
                params["data"].as_str().unwrap_or(""),
            );
        }
        _ => {
            tracing::debug!("ignoring frame with method '{method}'");
        }
    }
}

async fn post_frame(http: &Client, server_url: &str, frame: &impl serde::Serialize) {
    if let Err(e) = http
        .post(format!("{server_url}/mcp"))
        .json(frame)
        .send()
        .await
    {
        tracing::error!("failed to post frame: {e}");
    }
}

/// Produce the completion for one sampling request.
async fn generate(http: &Client, mode: &BackendMode, params: &Value) -> anyhow::Result<String> {
    let system_prompt = params["systemPrompt"].as_str().unwrap_or_default();
    let user_prompt = params["messages"][0]["content"]["text"]
        .as_str()
        .unwrap_or_default();
    let hint = params["modelPreferences"]["hints"][0]["name"]
        .as_str()
        .unwrap_or_default();

    tracing::info!("sampling request for hint '{hint}'");

    match mode {
        BackendMode::Mock => Ok(format!("[{hint}] {user_prompt}")),
        BackendMode::Llm {
            default_url,
            ollama_url,
            model,
        } => {
            let url = if hint == "ollama" { ollama_url } else { default_url };
            call_llm(http, url, model, system_prompt, user_prompt).await
        }
    }
}

/// Call an OpenAI-compatible chat completion API.
async fn call_llm(
    http: &Client,
    url: &str,
    model: &str,
    system_prompt: &str,
    user_prompt: &str,
) -> anyhow::Result<String> {
    let resp = http
        .post(format!("{url}/chat/completions"))
        .json(&serde_json::json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt }
            ]
        }))
        .send()
        .await?
        .json::<Value>()
        .await?;

    let content = resp["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or("No response from LLM")
        .to_string();

    Ok(content)
}
