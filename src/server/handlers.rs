//! Route handlers of the HTTP service.

use super::types::{
    ActiveResponse, AppState, DeadLetterStatsResponse, ErrorResponse, FetchRequest, FetchResponse,
};
use crate::events::{ProgressEvent, GLOBAL};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;

/// `POST /fetch`: starts a crawl and returns its request id
pub async fn fetch_handler(
    State(state): State<AppState>,
    body: Result<Json<FetchRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return bad_request(format!("invalid JSON: {}", rejection.body_text()));
        }
    };

    if request.urls.iter().all(|u| u.trim().is_empty()) {
        return bad_request("empty urls".to_string());
    }

    let request_id = state.orchestrator.submit(request.urls);
    Json(FetchResponse {
        status: "started".to_string(),
        request_id,
    })
    .into_response()
}

/// `GET /events`: every progress event
pub async fn events_all_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    event_stream(state, GLOBAL.to_string())
}

/// `GET /events/:request_id`: progress events of one request
pub async fn events_by_request_handler(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    event_stream(state, request_id)
}

/// `GET /active`: requests still crawling
pub async fn active_handler(State(state): State<AppState>) -> Json<ActiveResponse> {
    Json(ActiveResponse {
        requests: state.orchestrator.active(),
    })
}

/// `GET /dead-letter/stats`: queue name and size
pub async fn dead_letter_stats_handler(
    State(state): State<AppState>,
) -> Json<DeadLetterStatsResponse> {
    let response = match state.orchestrator.dead_letter() {
        Some(queue) => {
            let stats = queue.stats().await;
            DeadLetterStatsResponse {
                enabled: true,
                queue_name: Some(stats.queue_name),
                size: stats.size,
            }
        }
        None => DeadLetterStatsResponse {
            enabled: false,
            queue_name: None,
            size: 0,
        },
    };
    Json(response)
}

/// SSE stream: a `connected` event, then each progress event named by its
/// type, until the client leaves or the server shuts down
fn event_stream(
    state: AppState,
    request_id: String,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.orchestrator.events().subscribe(&request_id);
    tracing::debug!("SSE client connected (request_id={:?})", request_id);

    let connected = stream::once(async { Ok(Event::default().event("connected").data("{}")) });
    let events = stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.recv().await?;
        Some((Ok(to_sse(&event)), subscription))
    });

    let stream = connected
        .chain(events)
        .take_until(state.shutdown.cancelled_owned());

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse(event: &ProgressEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(event.kind.as_str()).data(data)
}

fn bad_request(error: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response()
}
