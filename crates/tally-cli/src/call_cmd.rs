use std::sync::Arc;

use serde_json::Value;

use tally_mcp::{PeerCapabilities, Session};

use crate::transport::HttpTransport;

/// Open a session, invoke one tool, and print its text result.
///
/// One-shot invocations never service sampling requests, so no
/// capabilities are advertised; an explanation tool called this way
/// reports per-hint unavailability instead of waiting on a client
/// that will never answer.
pub async fn run(server_url: &str, tool: &str, arguments: Value) -> anyhow::Result<()> {
    let session = Session::new(Arc::new(HttpTransport::new(server_url)));
    session
        .initialize("tally-cli", PeerCapabilities::default())
        .await?;

    let result = session.call_tool(tool, arguments).await?;
    session.close();

    match result["content"][0]["text"].as_str() {
        Some(text) => println!("{text}"),
        None => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    Ok(())
}
