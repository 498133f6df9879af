//! Progress events and their publish/subscribe fan-out
//!
//! Every stage of a crawl reports what it is doing as a [`ProgressEvent`].
//! The [`EventHub`] hands those events to live observers (the SSE stream,
//! the one-shot CLI printer, tests) without ever blocking the producer.

mod hub;

pub use hub::{EventHub, Subscription, GLOBAL};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a progress event; serialized as its snake_case name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A seed crawl is about to begin
    Start,
    /// Sampled progress of a seed crawl
    Progress,
    /// A seed (non-empty url) or a whole request (empty url) finished
    Complete,
    /// A seed failed, e.g. it could not be parsed
    Error,
    /// A seed hit its page cap
    LimitReached,
    /// A batch exhausted its delivery retries
    BatchDeliveryFailed,
}

impl EventKind {
    /// Name used both in JSON payloads and as the SSE event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Progress => "progress",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::LimitReached => "limit_reached",
            Self::BatchDeliveryFailed => "batch_delivery_failed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single progress notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub request_id: String,
    pub url: String,
    pub done: usize,
    pub total: usize,
    pub percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressEvent {
    /// Creates an event with zeroed counters
    pub fn new(kind: EventKind, request_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind,
            request_id: request_id.into(),
            url: url.into(),
            done: 0,
            total: 0,
            percent: 0.0,
            message: None,
        }
    }

    /// Sets `done`/`total` and derives `percent`
    pub fn with_counts(mut self, done: usize, total: usize) -> Self {
        self.done = done;
        self.total = total;
        self.percent = percent(done, total);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// `done / total * 100`, or 0 when nothing is known yet
pub fn percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    done as f64 / total as f64 * 100.0
}
