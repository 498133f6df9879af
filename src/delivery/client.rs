use super::{stream_batch, Backoff, DeliveryError, PageBatch};
use crate::clock::Clock;
use crate::config::{AnalyzerConfig, UserAgentConfig};
use crate::events::{EventHub, EventKind, ProgressEvent};
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Snapshot of delivery outcomes since startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryCounts {
    /// Batches the analyzer accepted
    pub delivered: u64,
    /// Batches handed to the dead-letter queue
    pub dead_lettered: u64,
    /// Batches dropped for good
    pub lost: u64,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    dead_lettered: AtomicU64,
    lost: AtomicU64,
}

/// Sends batches to the analyzer with retry and backoff
///
/// Cloning is cheap; clones share the HTTP client and the counters.
#[derive(Clone)]
pub struct DeliveryClient {
    client: Client,
    url: String,
    gzip: bool,
    max_retries: u32,
    backoff: Backoff,
    max_response_bytes: usize,
    events: EventHub,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    counters: Arc<Counters>,
}

impl DeliveryClient {
    /// Builds a client from the analyzer configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Analyzer endpoint, retry budget and limits
    /// * `user_agent` - Identifying header sent with every request
    /// * `events` - Hub that receives `batch_delivery_failed` events
    /// * `clock` - Source of backoff sleeps
    ///
    /// # Returns
    ///
    /// * `Ok(DeliveryClient)` - Ready to send
    /// * `Err(reqwest::Error)` - The HTTP client could not be built
    pub fn new(
        config: &AnalyzerConfig,
        user_agent: &UserAgentConfig,
        events: EventHub,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent.header_value())
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            gzip: config.gzip,
            max_retries: config.max_retries,
            backoff: Backoff::from_millis(config.backoff_base_ms),
            max_response_bytes: config.max_response_bytes,
            events,
            clock,
            cancel: CancellationToken::new(),
            counters: Arc::new(Counters::default()),
        })
    }

    /// Stops retrying once `token` is cancelled; the attempt in flight
    /// still completes
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Endpoint batches are posted to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Delivers `batch`, publishing `batch_delivery_failed` if every attempt
    /// fails
    ///
    /// The caller owns the batch afterwards: on `Err` it is expected to hand
    /// it to the dead-letter queue.
    pub async fn send_batch(&self, batch: &PageBatch) -> Result<(), DeliveryError> {
        let result = self.deliver(batch).await;

        if let Err(e) = &result {
            tracing::error!(
                "Batch {} for {} could not be delivered: {}",
                batch.batch_id,
                batch.main_url,
                e
            );
            self.events.publish(
                ProgressEvent::new(
                    EventKind::BatchDeliveryFailed,
                    batch.request_id.as_str(),
                    batch.main_url.as_str(),
                )
                .with_counts(batch.stats.successful, batch.total_pages)
                .with_message(format!("batch {}: {}", batch.batch_id, e)),
            );
        }

        result
    }

    /// Delivers `batch` with retries but without publishing events
    ///
    /// Makes up to `max_retries + 1` attempts. Before retry `n` the client
    /// sleeps `base * 2^(n-1)`, capped at one minute.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The analyzer answered 2xx
    /// * `Err(DeliveryError::Exhausted)` - Every attempt failed, or retries
    ///   were cut short by cancellation or an encoding failure
    pub async fn deliver(&self, batch: &PageBatch) -> Result<(), DeliveryError> {
        let batch = Arc::new(batch.clone());
        let mut attempts = 0;

        let last = loop {
            attempts += 1;
            let err = match self.attempt(batch.clone()).await {
                Ok(()) => {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        "Delivered batch {} ({} pages) on attempt {}",
                        batch.batch_id,
                        batch.total_pages,
                        attempts
                    );
                    return Ok(());
                }
                Err(e) => e,
            };

            if matches!(err, DeliveryError::Encode(_))
                || attempts > self.max_retries
                || self.cancel.is_cancelled()
            {
                break err;
            }

            tracing::warn!(
                "Delivery attempt {}/{} for batch {} failed: {}",
                attempts,
                self.max_retries + 1,
                batch.batch_id,
                err
            );

            let delay = self.backoff.delay(attempts - 1);
            let cancelled = tokio::select! {
                _ = self.cancel.cancelled() => true,
                _ = self.clock.sleep(delay) => false,
            };
            if cancelled {
                tracing::debug!("Delivery of {} cancelled during backoff", batch.batch_id);
                break err;
            }
        };

        Err(DeliveryError::Exhausted {
            attempts,
            last: Box::new(last),
        })
    }

    /// One streamed POST of the batch
    async fn attempt(&self, batch: Arc<PageBatch>) -> Result<(), DeliveryError> {
        let (body, encoder) = stream_batch(batch, self.gzip);

        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if self.gzip {
            request = request.header(CONTENT_ENCODING, "gzip");
        }

        let response = request.send().await.map_err(DeliveryError::transport)?;
        let status = response.status();
        self.discard_body(response).await;

        encoder
            .await
            .map_err(|e| DeliveryError::Encode(e.to_string()))??;

        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status {
                status: status.as_u16(),
            })
        }
    }

    /// Reads and drops the response body, stopping at the byte cap
    async fn discard_body(&self, mut response: Response) {
        let mut read = 0usize;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    read += chunk.len();
                    if read >= self.max_response_bytes {
                        tracing::debug!("Analyzer response exceeded {} bytes", read);
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("Failed to read analyzer response: {}", e);
                    break;
                }
            }
        }
    }

    /// Records a batch handed to the dead-letter queue
    pub fn record_dead_lettered(&self) {
        self.counters.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a batch dropped with no further recourse
    pub fn record_lost(&self) {
        self.counters.lost.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counts(&self) -> DeliveryCounts {
        DeliveryCounts {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dead_lettered: self.counters.dead_lettered.load(Ordering::Relaxed),
            lost: self.counters.lost.load(Ordering::Relaxed),
        }
    }
}
