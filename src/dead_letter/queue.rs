use super::{DeadLetterError, DeadLetterStore, FailedBatch, MemoryStore, RedisStore};
use crate::clock::Clock;
use crate::config::DeadLetterConfig;
use crate::delivery::DeliveryClient;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Size report for the stats endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadLetterStats {
    pub queue_name: String,
    pub size: usize,
}

/// Tally of one redelivery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryOutcome {
    /// Records taken off the queue
    pub attempted: usize,
    /// Records the analyzer accepted
    pub delivered: usize,
    /// Records that failed again and went back on the queue
    pub requeued: usize,
    /// Records dropped for good: at the retry cap, unreadable, or not
    /// requeued because the store failed
    pub dropped: usize,
}

/// Typed view over a [`DeadLetterStore`] holding [`FailedBatch`] records
#[derive(Clone)]
pub struct DeadLetterQueue {
    store: Arc<dyn DeadLetterStore>,
    queue_name: String,
    max_retries: u32,
}

impl DeadLetterQueue {
    pub fn new(
        store: Arc<dyn DeadLetterStore>,
        queue_name: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            queue_name: queue_name.into(),
            max_retries,
        }
    }

    /// Queue backed by process memory; records do not survive a restart
    pub fn in_memory(queue_name: impl Into<String>, max_retries: u32) -> Self {
        Self::new(Arc::new(MemoryStore::new()), queue_name, max_retries)
    }

    /// Opens the Redis-backed queue described by `config`
    ///
    /// Returns `None` when no Redis URL is configured or the server cannot be
    /// reached. The queue is then disabled for the life of the process and
    /// failed batches are lost; this is logged at `error` level.
    pub async fn connect(config: &DeadLetterConfig) -> Option<Self> {
        let Some(redis_url) = config.redis_url.as_deref() else {
            tracing::warn!("No dead-letter Redis URL configured; failed batches will be lost");
            return None;
        };

        let ttl = Duration::from_secs(config.ttl_days * 24 * 60 * 60);
        match RedisStore::connect(redis_url, config.queue_name.as_str(), ttl).await {
            Ok(store) => {
                tracing::info!("Dead-letter queue enabled: {}", config.queue_name);
                Some(Self::new(
                    Arc::new(store),
                    config.queue_name.as_str(),
                    config.max_retries,
                ))
            }
            Err(e) => {
                tracing::error!(
                    "Dead-letter queue DISABLED, Redis unreachable at {}: {}. Failed batches will be lost",
                    redis_url,
                    e
                );
                None
            }
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Redelivery attempts after which a record is dropped
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Serializes and appends `record`
    pub async fn enqueue(&self, record: &FailedBatch) -> Result<(), DeadLetterError> {
        let json = serde_json::to_string(record)?;
        self.store.push(json).await?;
        tracing::info!(
            "Dead-lettered batch {} for {} (retry_count={}, error={})",
            record.batch.batch_id,
            record.batch.main_url,
            record.retry_count,
            record.error
        );
        Ok(())
    }

    /// Pops the oldest record, or `None` when the queue is empty
    ///
    /// A record that fails to deserialize is already removed from the store
    /// when the error is returned.
    pub async fn dequeue(&self) -> Result<Option<FailedBatch>, DeadLetterError> {
        match self.store.pop().await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn len(&self) -> Result<usize, DeadLetterError> {
        self.store.len().await
    }

    pub async fn is_empty(&self) -> Result<bool, DeadLetterError> {
        Ok(self.len().await? == 0)
    }

    /// Queue name and size; a store error reports size 0
    pub async fn stats(&self) -> DeadLetterStats {
        let size = match self.len().await {
            Ok(size) => size,
            Err(e) => {
                tracing::error!("Failed to read dead-letter queue length: {}", e);
                0
            }
        };
        DeadLetterStats {
            queue_name: self.queue_name.clone(),
            size,
        }
    }

    /// Tries to redeliver the records queued when the pass starts
    ///
    /// At most `len()` records (as observed at the start) are processed, so a
    /// record requeued during this pass waits for the next one. Each record
    /// gets one full delivery attempt sequence:
    ///
    /// - success: the record is gone
    /// - failure: `retry_count` is incremented, `error`/`timestamp` updated,
    ///   and the record is requeued while `retry_count < max_retries`;
    ///   otherwise it is dropped and logged as data loss
    ///
    /// Cancellation is checked between records; a record already taken off
    /// the queue is always finished.
    pub async fn retry_pass(
        &self,
        delivery: &DeliveryClient,
        clock: &dyn Clock,
        cancel: &CancellationToken,
    ) -> Result<RetryOutcome, DeadLetterError> {
        let pending = self.len().await?;
        let mut outcome = RetryOutcome::default();

        for _ in 0..pending {
            if cancel.is_cancelled() {
                tracing::debug!("Dead-letter pass cancelled");
                break;
            }

            let mut record = match self.dequeue().await {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(DeadLetterError::Serialization(e)) => {
                    tracing::error!("Dropping unreadable dead-letter record: {}", e);
                    outcome.attempted += 1;
                    outcome.dropped += 1;
                    delivery.record_lost();
                    continue;
                }
                Err(e) => return Err(e),
            };
            outcome.attempted += 1;

            record.batch.is_complete = true;
            tracing::info!(
                "Retrying dead-lettered batch {} (attempt {})",
                record.batch.batch_id,
                record.retry_count + 1
            );

            match delivery.deliver(&record.batch).await {
                Ok(()) => {
                    tracing::info!(
                        "Dead-lettered batch {} delivered",
                        record.batch.batch_id
                    );
                    outcome.delivered += 1;
                }
                Err(e) => {
                    record.retry_count += 1;
                    record.error = e.to_string();
                    record.timestamp = clock.now();

                    if record.retry_count < self.max_retries {
                        match self.enqueue(&record).await {
                            Ok(()) => outcome.requeued += 1,
                            Err(e) => {
                                tracing::error!(
                                    "Batch {} for {} could not be requeued and was dropped; its pages are lost: {}",
                                    record.batch.batch_id,
                                    record.batch.main_url,
                                    e
                                );
                                delivery.record_lost();
                                outcome.dropped += 1;
                            }
                        }
                    } else {
                        tracing::error!(
                            "Batch {} for {} exceeded {} dead-letter retries and was dropped; its pages are lost",
                            record.batch.batch_id,
                            record.batch.main_url,
                            self.max_retries
                        );
                        delivery.record_lost();
                        outcome.dropped += 1;
                    }
                }
            }
        }

        Ok(outcome)
    }
}
