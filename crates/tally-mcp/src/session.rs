use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tally_core::{SamplingOutcome, SamplingRequest};

use crate::tools::ToolDefinition;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
pub const METHOD_PING: &str = "ping";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_TOOLS_CALL: &str = "tools/call";
pub const METHOD_CREATE_MESSAGE: &str = "sampling/createMessage";
pub const METHOD_LOG_MESSAGE: &str = "notifications/message";

/// Errors raised by session operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("session not initialized")]
    NotInitialized,

    #[error("session already initialized")]
    AlreadyInitialized,

    #[error("session closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote error {code}: {message}")]
    Remote { code: i32, message: String },

    #[error("timeout")]
    Timeout,
}

/// One side of a bidirectional JSON-RPC channel. Implementations must
/// support overlapping in-flight requests: correlation is by request
/// id, so one pending request never blocks another's reply.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a request and wait for the matching response.
    async fn request(&self, method: &str, params: Value) -> Result<Value, SessionError>;

    /// Send a one-way notification. Best effort, no reply.
    async fn notify(&self, method: &str, params: Value);
}

/// Optional protocol features the remote party advertised during the
/// initialize handshake.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PeerCapabilities {
    pub sampling: bool,
}

impl PeerCapabilities {
    /// Extract capabilities from an initialize request or response.
    #[must_use]
    pub fn from_negotiation(params: &Value) -> Self {
        Self {
            sampling: params
                .get("capabilities")
                .and_then(|caps| caps.get("sampling"))
                .is_some(),
        }
    }
}

/// Severity levels for logging notifications.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Initialized,
    Closed,
}

/// An explicitly owned protocol session over one transport.
///
/// Lifecycle is `Uninitialized -> Initialized -> Closed`. Every
/// operation other than `initialize` and `close` requires the
/// initialized state; `close` is idempotent and terminal.
pub struct Session {
    transport: Arc<dyn Transport>,
    state: RwLock<State>,
    peer: RwLock<PeerCapabilities>,
}

impl Session {
    /// Create a session that still needs to run the handshake.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: RwLock::new(State::Uninitialized),
            peer: RwLock::new(PeerCapabilities::default()),
        }
    }

    /// Create a session for the side that accepted the peer's
    /// handshake and already holds its negotiated capabilities.
    pub fn negotiated(transport: Arc<dyn Transport>, peer: PeerCapabilities) -> Self {
        Self {
            transport,
            state: RwLock::new(State::Initialized),
            peer: RwLock::new(peer),
        }
    }

    fn state(&self) -> State {
        *self.state.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn set_state(&self, next: State) {
        *self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = next;
    }

    fn ensure_initialized(&self) -> Result<(), SessionError> {
        match self.state() {
            State::Initialized => Ok(()),
            State::Uninitialized => Err(SessionError::NotInitialized),
            State::Closed => Err(SessionError::Closed),
        }
    }

    /// Peer capabilities recorded at negotiation time.
    #[must_use]
    pub fn peer_capabilities(&self) -> PeerCapabilities {
        *self.peer.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Perform the capability exchange, advertising exactly the given
    /// capabilities. Must be called exactly once before any other
    /// operation. A one-shot caller that never services sampling
    /// requests passes `PeerCapabilities::default()`.
    pub async fn initialize(
        &self,
        client_name: &str,
        advertise: PeerCapabilities,
    ) -> Result<PeerCapabilities, SessionError> {
        match self.state() {
            State::Uninitialized => {}
            State::Initialized => return Err(SessionError::AlreadyInitialized),
            State::Closed => return Err(SessionError::Closed),
        }

        let mut capabilities = serde_json::Map::new();
        if advertise.sampling {
            capabilities.insert("sampling".to_string(), serde_json::json!({}));
        }

        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": capabilities,
            "clientInfo": {
                "name": client_name,
                "version": env!("CARGO_PKG_VERSION"),
            }
        });

        let result = self.transport.request(METHOD_INITIALIZE, params).await?;
        let peer = PeerCapabilities::from_negotiation(&result);

        *self
            .peer
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = peer;
        self.set_state(State::Initialized);

        self.transport
            .notify(METHOD_INITIALIZED, Value::Null)
            .await;

        Ok(peer)
    }

    /// Liveness check against the remote party.
    pub async fn ping(&self) -> Result<(), SessionError> {
        self.ensure_initialized()?;
        self.transport
            .request(METHOD_PING, serde_json::json!({}))
            .await?;
        Ok(())
    }

    /// Fetch the tool descriptors advertised by the remote party.
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>, SessionError> {
        self.ensure_initialized()?;
        let result = self
            .transport
            .request(METHOD_TOOLS_LIST, serde_json::json!({}))
            .await?;

        let tools = result.get("tools").cloned().unwrap_or(Value::Null);
        serde_json::from_value(tools)
            .map_err(|e| SessionError::Transport(format!("malformed tools/list result: {e}")))
    }

    /// Invoke a named tool on the remote party.
    pub async fn call_tool(&self, name: &str, args: Value) -> Result<Value, SessionError> {
        self.ensure_initialized()?;
        self.transport
            .request(
                METHOD_TOOLS_CALL,
                serde_json::json!({ "name": name, "arguments": args }),
            )
            .await
    }

    /// The sampling primitive: ask the remote party to run one text
    /// completion. Capability-gated; when the peer never advertised
    /// sampling this resolves to a failure outcome without touching
    /// the wire. A deadline, when given, bounds the wait.
    pub async fn create_message(
        &self,
        request: &SamplingRequest,
        deadline: Option<Duration>,
    ) -> Result<SamplingOutcome, SessionError> {
        self.ensure_initialized()?;

        if !self.peer_capabilities().sampling {
            tracing::warn!("peer does not support the sampling capability");
            return Ok(SamplingOutcome::Failure {
                reason: "sampling capability not available on client".to_string(),
            });
        }

        let params = serde_json::json!({
            "systemPrompt": request.system_prompt,
            "messages": [{
                "role": "user",
                "content": { "type": "text", "text": request.user_prompt }
            }],
            "modelPreferences": {
                "hints": [{ "name": request.model_hint.as_str() }]
            }
        });

        let call = self.transport.request(METHOD_CREATE_MESSAGE, params);
        let result = match deadline {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| SessionError::Timeout)??,
            None => call.await?,
        };

        let text = result
            .get("content")
            .and_then(|content| content.get("text"))
            .and_then(Value::as_str);

        match text {
            Some(text) => Ok(SamplingOutcome::Success {
                text: text.to_string(),
            }),
            None => Ok(SamplingOutcome::Failure {
                reason: "sampling reply carried no text content".to_string(),
            }),
        }
    }

    /// Fire-and-forget logging notification. Never fails; dropped
    /// silently unless the session is initialized.
    pub async fn notify_logging(&self, level: LogLevel, message: &str) {
        if self.state() != State::Initialized {
            return;
        }

        let params = serde_json::json!({
            "level": level,
            "logger": "tally",
            "data": message,
        });
        self.transport.notify(METHOD_LOG_MESSAGE, params).await;
    }

    /// Close the session. Idempotent; all later operations fail with
    /// `SessionError::Closed`.
    pub fn close(&self) {
        self.set_state(State::Closed);
    }
}
