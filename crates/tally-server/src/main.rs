use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use tally_core::ModelHint;
use tally_mcp::SamplingConfig;
use tally_rates::{HttpRateSource, RateConfig, RateResolver};
use tally_server::app_state::AppState;
use tally_server::session::SessionManager;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let host = env_or("TALLY_HOST", "0.0.0.0");
    let port = env_or("TALLY_PORT", "8080");

    let rate_config = RateConfig {
        base_url: env_or("TALLY_RATES_URL", &RateConfig::default().base_url),
        connect_timeout_ms: env_u64("TALLY_RATES_CONNECT_TIMEOUT_MS", 20_000),
        read_timeout_ms: env_u64("TALLY_RATES_READ_TIMEOUT_MS", 25_000),
    };
    let source = HttpRateSource::new(&rate_config).expect("Failed to build rate source");

    let hints: Vec<ModelHint> = env_or("TALLY_SAMPLING_HINTS", "openai,github")
        .split(',')
        .map(str::trim)
        .filter(|hint| !hint.is_empty())
        .map(ModelHint::new)
        .collect();
    let per_hint_deadline = std::env::var("TALLY_SAMPLING_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis);

    let state = AppState {
        resolver: RateResolver::new(Arc::new(source)),
        sessions: Arc::new(SessionManager::new()),
        sampling: SamplingConfig {
            hints,
            per_hint_deadline,
        },
    };

    let app = tally_server::router::create_router(state);

    let addr = format!("{host}:{port}");
    tracing::info!("Tally MCP server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
