//! HTTP service in front of the orchestrator.
//!
//! Provides these endpoints:
//! - `POST /fetch` - Submit seeds, returns the request id
//! - `GET /events` and `GET /events/:request_id` - Server-Sent Events progress stream
//! - `GET /active` - Requests still crawling
//! - `GET /dead-letter/stats` - Dead-letter queue size
//!
//! The service only translates HTTP to orchestrator calls; crawling and
//! delivery keep running regardless of connected clients.

mod handlers;
mod types;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use handlers::{
    active_handler, dead_letter_stats_handler, events_all_handler, events_by_request_handler,
    fetch_handler,
};
pub use types::{AppState, FetchRequest, FetchResponse};

/// Builds the router with every endpoint bound to `state`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/fetch", post(fetch_handler))
        .route("/events", get(events_all_handler))
        .route("/events/:request_id", get(events_by_request_handler))
        .route("/active", get(active_handler))
        .route("/dead-letter/stats", get(dead_letter_stats_handler))
        .with_state(state)
}

/// Binds `bind` and serves until `state.shutdown` is cancelled
pub async fn serve(bind: &str, state: AppState) -> Result<(), anyhow::Error> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind HTTP service to {}: {}", bind, e))?;

    tracing::info!("HTTP service listening on http://{}/", bind);
    serve_on(listener, state).await
}

/// Serves on an already bound listener until `state.shutdown` is cancelled
pub async fn serve_on(listener: TcpListener, state: AppState) -> Result<(), anyhow::Error> {
    let shutdown: CancellationToken = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| anyhow::anyhow!("HTTP service error: {}", e))?;

    tracing::info!("HTTP service stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, SystemClock};
    use crate::config::parse_config;
    use crate::dead_letter::DeadLetterQueue;
    use crate::delivery::DeliveryClient;
    use crate::events::{EventHub, EventKind, ProgressEvent};
    use crate::Orchestrator;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    const CONFIG: &str = r#"
[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[analyzer]
url = "http://127.0.0.1:9/ingest"
max-retries = 0
"#;

    async fn start(dead_letter: Option<DeadLetterQueue>) -> (SocketAddr, AppState) {
        let config = Arc::new(parse_config(CONFIG).unwrap());
        let events = EventHub::new(16);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let shutdown = CancellationToken::new();
        let delivery = DeliveryClient::new(
            &config.analyzer,
            &config.user_agent,
            events.clone(),
            clock.clone(),
        )
        .unwrap();
        let orchestrator = Orchestrator::new(
            config,
            events,
            delivery,
            dead_letter,
            clock,
            shutdown.clone(),
        )
        .unwrap();

        let state = AppState {
            orchestrator,
            shutdown,
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_on(listener, state.clone()));
        (addr, state)
    }

    #[tokio::test]
    async fn test_fetch_rejects_empty_urls() {
        let (addr, state) = start(None).await;
        let client = reqwest::Client::new();

        for body in [r#"{"urls": []}"#, r#"{"urls": ["  ", ""]}"#, "not json"] {
            let response = client
                .post(format!("http://{}/fetch", addr))
                .header("Content-Type", "application/json")
                .body(body)
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 400, "body {:?}", body);
        }

        assert!(state.orchestrator.active().is_empty());
        state.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_fetch_returns_request_id() {
        let (addr, state) = start(None).await;

        let response = reqwest::Client::new()
            .post(format!("http://{}/fetch", addr))
            .json(&serde_json::json!({ "urls": ["not a url"] }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: FetchResponse = response.json().await.unwrap();
        assert_eq!(body.status, "started");
        assert!(!body.request_id.is_empty());

        state.orchestrator.wait_for_crawls().await;
        state.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_events_stream_starts_with_connected() {
        let (addr, state) = start(None).await;

        let mut response = reqwest::get(format!("http://{}/events/R1", addr))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let mut received = String::new();
        while !received.contains("event: connected") {
            let chunk = response.chunk().await.unwrap().unwrap();
            received.push_str(&String::from_utf8_lossy(&chunk));
        }
        assert!(received.contains("data: {}"));

        // Other requests are filtered out
        let events = state.orchestrator.events();
        events.publish(ProgressEvent::new(EventKind::Start, "R2", "https://b.test/"));
        events.publish(
            ProgressEvent::new(EventKind::LimitReached, "R1", "https://a.test/")
                .with_counts(10, 10),
        );

        let mut received = String::new();
        while !received.contains("\n\n") {
            let chunk = tokio::time::timeout(Duration::from_secs(5), response.chunk())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            received.push_str(&String::from_utf8_lossy(&chunk));
        }
        assert!(received.contains("event: limit_reached"));
        assert!(received.contains(r#""request_id":"R1""#));
        assert!(!received.contains("b.test"));

        state.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_active_lists_requests() {
        let (addr, state) = start(None).await;

        let body: serde_json::Value = reqwest::get(format!("http://{}/active", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["requests"], serde_json::json!([]));

        state.shutdown.cancel();
    }

    #[tokio::test]
    async fn test_dead_letter_stats() {
        let (addr, state) = start(None).await;
        let body: serde_json::Value = reqwest::get(format!("http://{}/dead-letter/stats", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["enabled"], false);
        assert_eq!(body["size"], 0);
        state.shutdown.cancel();

        let (addr, state) = start(Some(DeadLetterQueue::in_memory("dlq:test", 5))).await;
        let body: serde_json::Value = reqwest::get(format!("http://{}/dead-letter/stats", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["enabled"], true);
        assert_eq!(body["queue_name"], "dlq:test");
        assert_eq!(body["size"], 0);
        state.shutdown.cancel();
    }
}
