pub mod jsonrpc;
pub mod sampling;
pub mod session;
pub mod tools;

pub use jsonrpc::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
pub use sampling::{Orchestrator, SamplingConfig};
pub use session::{LogLevel, PeerCapabilities, Session, SessionError, Transport};
pub use tools::{ToolDefinition, ToolRegistry};
