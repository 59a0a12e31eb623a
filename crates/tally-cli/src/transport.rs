use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use uuid::Uuid;

use tally_mcp::session::{SessionError, Transport};
use tally_mcp::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Client-to-server transport: each request is one HTTP POST whose
/// body is the JSON-RPC response.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    #[must_use]
    pub fn new(server_url: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{server_url}/mcp"),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, SessionError> {
        let request = JsonRpcRequest::new(Uuid::new_v4().to_string(), method, Some(params));

        let response: JsonRpcResponse = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        if let Some(error) = response.error {
            return Err(SessionError::Remote {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str, params: Value) {
        let notification = JsonRpcNotification::new(method, Some(params));
        if let Err(e) = self
            .client
            .post(&self.endpoint)
            .json(&notification)
            .send()
            .await
        {
            tracing::warn!("failed to send notification: {e}");
        }
    }
}
