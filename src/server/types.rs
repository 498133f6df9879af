//! Request and response bodies of the HTTP service.

use crate::crawler::{ActiveCrawl, Orchestrator};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    /// Ends open event streams on shutdown
    pub shutdown: CancellationToken,
}

/// Body of `POST /fetch`
#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Reply to an accepted `POST /fetch`
#[derive(Debug, Serialize, Deserialize)]
pub struct FetchResponse {
    pub status: String,
    pub request_id: String,
}

/// Reply of `GET /active`
#[derive(Debug, Serialize)]
pub struct ActiveResponse {
    pub requests: Vec<ActiveCrawl>,
}

/// Reply of `GET /dead-letter/stats`
#[derive(Debug, Serialize)]
pub struct DeadLetterStatsResponse {
    pub enabled: bool,
    pub queue_name: Option<String>,
    pub size: usize,
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
