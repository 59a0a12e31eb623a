use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use uuid::Uuid;

use tally_mcp::session::{PeerCapabilities, SessionError, Transport};
use tally_mcp::{JsonRpcNotification, JsonRpcRequest, Session};

/// The server's half of the bidirectional channel to the connected
/// client. Outbound frames (responses, server-initiated requests,
/// notifications) go to the SSE stream; replies the client POSTs back
/// are matched to their pending request by id.
pub struct ClientChannel {
    outbound: broadcast::Sender<Arc<Value>>,
    pending: Mutex<HashMap<String, oneshot::Sender<Result<Value, SessionError>>>>,
}

impl ClientChannel {
    #[must_use]
    pub fn new() -> Self {
        let (outbound, _) = broadcast::channel(100);
        Self {
            outbound,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to the outbound frame stream (one per SSE connection).
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Value>> {
        self.outbound.subscribe()
    }

    /// Whether any SSE connection is currently attached.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.outbound.receiver_count() > 0
    }

    /// Queue an outbound frame. Returns false when no client listens.
    pub fn send(&self, frame: Value) -> bool {
        self.outbound.send(Arc::new(frame)).is_ok()
    }

    /// Complete a pending request with the client's reply. Returns
    /// false (and the reply is dropped) when the id is unknown, e.g.
    /// the waiter already timed out.
    pub fn complete(&self, id: &str, reply: Result<Value, SessionError>) -> bool {
        let waiter = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(id);

        match waiter {
            Some(tx) => tx.send(reply).is_ok(),
            None => {
                tracing::warn!("dropping reply for unknown request id {id}");
                false
            }
        }
    }

    fn park(&self, id: String, tx: oneshot::Sender<Result<Value, SessionError>>) {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(id, tx);
    }

    fn abandon(&self, id: &str) {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(id);
    }
}

impl Default for ClientChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes a parked request id when the wait ends. Covers every exit
/// path, including a caller dropping the `request` future before the
/// reply arrives (e.g. an expired sampling deadline), so the pending
/// map never accumulates stale entries.
struct PendingGuard<'a> {
    channel: &'a ClientChannel,
    id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.channel.abandon(self.id);
    }
}

#[async_trait]
impl Transport for ClientChannel {
    async fn request(&self, method: &str, params: Value) -> Result<Value, SessionError> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.park(id.clone(), tx);
        let _cleanup = PendingGuard { channel: self, id: &id };

        let frame = serde_json::to_value(JsonRpcRequest::new(id.clone(), method, Some(params)))
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        if !self.send(frame) {
            return Err(SessionError::Transport(
                "no client connected to receive the request".to_string(),
            ));
        }

        rx.await
            .map_err(|_| SessionError::Transport("channel closed before reply".to_string()))?
    }

    async fn notify(&self, method: &str, params: Value) {
        let frame = JsonRpcNotification::new(method, Some(params));
        match serde_json::to_value(frame) {
            Ok(frame) => {
                let _ = self.send(frame);
            }
            Err(e) => tracing::warn!("failed to serialize notification: {e}"),
        }
    }
}

/// Tracks the connected client's negotiated capabilities and hands out
/// session handles bound to its channel.
pub struct SessionManager {
    channel: Arc<ClientChannel>,
    peer: RwLock<PeerCapabilities>,
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            channel: Arc::new(ClientChannel::new()),
            peer: RwLock::new(PeerCapabilities::default()),
        }
    }

    #[must_use]
    pub fn channel(&self) -> Arc<ClientChannel> {
        Arc::clone(&self.channel)
    }

    /// Record what the client advertised in its initialize request.
    pub fn record_capabilities(&self, peer: PeerCapabilities) {
        *self
            .peer
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = peer;
    }

    #[must_use]
    pub fn client_capabilities(&self) -> PeerCapabilities {
        *self
            .peer
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Open a session handle over the client channel. The handshake
    /// already happened (the client initiated it), so the session
    /// starts initialized with the recorded capabilities.
    #[must_use]
    pub fn open_session(&self) -> Session {
        Session::negotiated(self.channel(), self.client_capabilities())
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
