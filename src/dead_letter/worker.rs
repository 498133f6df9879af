use super::{DeadLetterError, DeadLetterQueue, RetryOutcome};
use crate::clock::Clock;
use crate::delivery::DeliveryClient;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Periodically redelivers dead-lettered batches
pub struct DeadLetterWorker {
    queue: DeadLetterQueue,
    delivery: DeliveryClient,
    clock: Arc<dyn Clock>,
    interval: Duration,
    cancel: CancellationToken,
}

impl DeadLetterWorker {
    pub fn new(
        queue: DeadLetterQueue,
        delivery: DeliveryClient,
        clock: Arc<dyn Clock>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            queue,
            delivery,
            clock,
            interval,
            cancel,
        }
    }

    /// Runs one redelivery pass; an empty queue is skipped without touching
    /// the analyzer
    pub async fn run_once(&self) -> Result<RetryOutcome, DeadLetterError> {
        if self.queue.is_empty().await? {
            tracing::trace!("Dead-letter queue empty, nothing to retry");
            return Ok(RetryOutcome::default());
        }

        let outcome = self
            .queue
            .retry_pass(&self.delivery, self.clock.as_ref(), &self.cancel)
            .await?;

        tracing::info!(
            "Dead-letter pass: {} attempted, {} delivered, {} requeued, {} dropped",
            outcome.attempted,
            outcome.delivered,
            outcome.requeued,
            outcome.dropped
        );
        Ok(outcome)
    }

    /// Sleeps one interval, runs a pass, and repeats until cancelled
    ///
    /// A failed pass is logged and retried on the next tick.
    pub async fn run(self) {
        tracing::info!(
            "Dead-letter worker started (every {}s, queue {})",
            self.interval.as_secs(),
            self.queue.queue_name()
        );

        loop {
            let cancelled = tokio::select! {
                _ = self.cancel.cancelled() => true,
                _ = self.clock.sleep(self.interval) => false,
            };
            if cancelled {
                break;
            }

            if let Err(e) = self.run_once().await {
                tracing::error!("Dead-letter pass failed: {}", e);
            }
        }

        tracing::info!("Dead-letter worker stopped");
    }
}
