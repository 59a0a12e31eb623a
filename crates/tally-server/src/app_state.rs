use std::sync::Arc;

use tally_mcp::SamplingConfig;
use tally_rates::RateResolver;

use crate::session::SessionManager;

/// Shared application state with injected dependencies.
#[derive(Clone)]
pub struct AppState {
    pub resolver: RateResolver,
    pub sessions: Arc<SessionManager>,
    pub sampling: SamplingConfig,
}
