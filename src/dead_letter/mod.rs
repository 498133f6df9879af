//! Dead-letter queue for batches whose delivery permanently failed
//!
//! # Components
//!
//! - `DeadLetterStore`: durable FIFO list (Redis, or memory for tests)
//! - `DeadLetterQueue`: typed enqueue/dequeue plus the redelivery pass
//! - `DeadLetterWorker`: runs the redelivery pass on a fixed interval
//!
//! Records are pushed newest-first and popped oldest-first. A record is
//! retried until its `retry_count` reaches the cap, then dropped and logged
//! as data loss.

mod queue;
mod store;
mod worker;

pub use queue::{DeadLetterQueue, DeadLetterStats, RetryOutcome};
pub use store::{DeadLetterStore, MemoryStore, RedisStore};
pub use worker::DeadLetterWorker;

use crate::delivery::PageBatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the dead-letter queue
#[derive(Debug, Error)]
pub enum DeadLetterError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to (de)serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A batch that exhausted its delivery retries, with failure bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedBatch {
    #[serde(flatten)]
    pub batch: PageBatch,
    pub error: String,
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

impl FailedBatch {
    /// Records a first failure; `retry_count` starts at 0
    pub fn new(batch: PageBatch, error: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            batch,
            error: error.into(),
            retry_count: 0,
            timestamp,
        }
    }
}
