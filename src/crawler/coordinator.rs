//! Crawl orchestration across seeds and requests
//!
//! The orchestrator owns everything a crawl request needs:
//! - Global concurrency cap over seed crawls
//! - Per-seed lifecycle (start, BFS, archive, hand-off, complete)
//! - Background delivery of finished batches, with dead-letter fallback
//! - The registry of in-flight requests

use crate::archive::build_archive;
use crate::clock::Clock;
use crate::config::Config;
use crate::crawler::registry::{ActiveCrawl, ActiveCrawls};
use crate::crawler::seed::SeedCrawler;
use crate::crawler::PageFetcher;
use crate::dead_letter::{DeadLetterQueue, FailedBatch};
use crate::delivery::{DeliveryClient, PageBatch};
use crate::events::{EventHub, EventKind, ProgressEvent};
use crate::state::{SeedCrawlState, SeedPhase};
use crate::url::normalize_seed;
use crate::RelayError;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// A multi-seed crawl submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    pub request_id: String,
    pub seeds: Vec<String>,
}

impl CrawlRequest {
    /// Creates a request with a freshly generated id
    pub fn new(seeds: Vec<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            seeds,
        }
    }

    /// Seeds with surrounding whitespace removed; blank entries are skipped
    pub fn non_blank_seeds(&self) -> impl Iterator<Item = &str> {
        self.seeds.iter().map(|s| s.trim()).filter(|s| !s.is_empty())
    }
}

struct Inner {
    config: Arc<Config>,
    seed_crawler: SeedCrawler,
    events: EventHub,
    delivery: DeliveryClient,
    dead_letter: Option<DeadLetterQueue>,
    clock: Arc<dyn Clock>,
    permits: Arc<Semaphore>,
    active: ActiveCrawls,
    crawls: TaskTracker,
    deliveries: TaskTracker,
    cancel: CancellationToken,
}

/// Fans crawl requests out to per-seed crawls and hands their batches off
///
/// Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Wires an orchestrator from its collaborators
    ///
    /// # Arguments
    ///
    /// * `config` - Crawler limits and the user agent for page fetches
    /// * `events` - Hub receiving every progress event
    /// * `delivery` - Client used to send finished batches
    /// * `dead_letter` - Fallback for undeliverable batches; `None` if disabled
    /// * `clock` - Timestamps for dead-letter records
    /// * `cancel` - Stops seed workers from taking new URLs once cancelled
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Ready to accept requests
    /// * `Err(RelayError)` - The page fetcher's HTTP client could not be built
    pub fn new(
        config: Arc<Config>,
        events: EventHub,
        delivery: DeliveryClient,
        dead_letter: Option<DeadLetterQueue>,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    ) -> Result<Self, RelayError> {
        let fetcher = PageFetcher::from_config(&config.crawler, &config.user_agent)?;
        let seed_crawler = SeedCrawler {
            fetcher,
            events: events.clone(),
            workers: config.crawler.per_seed_workers,
            progress_every_n: config.crawler.progress_every_n,
            cancel: cancel.clone(),
        };
        let permits = Arc::new(Semaphore::new(config.crawler.max_global_crawls));

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                seed_crawler,
                events,
                delivery,
                dead_letter,
                clock,
                permits,
                active: ActiveCrawls::new(),
                crawls: TaskTracker::new(),
                deliveries: TaskTracker::new(),
                cancel,
            }),
        })
    }

    pub fn events(&self) -> &EventHub {
        &self.inner.events
    }

    pub fn delivery(&self) -> &DeliveryClient {
        &self.inner.delivery
    }

    pub fn dead_letter(&self) -> Option<&DeadLetterQueue> {
        self.inner.dead_letter.as_ref()
    }

    /// Requests currently in flight, oldest first
    pub fn active(&self) -> Vec<ActiveCrawl> {
        self.inner.active.list()
    }

    /// Starts crawling `seeds` in the background and returns the request id
    pub fn submit(&self, seeds: Vec<String>) -> String {
        let request = CrawlRequest::new(seeds);
        let request_id = request.request_id.clone();

        // Registered before spawning so `/active` sees it immediately
        self.inner.active.insert(
            &request.request_id,
            request.seeds.len(),
            self.inner.clock.now(),
        );

        let orchestrator = self.clone();
        self.inner.crawls.spawn(async move {
            orchestrator.start_crawl(request).await;
        });

        tracing::info!("Accepted crawl request {}", request_id);
        request_id
    }

    /// Crawls every non-blank seed of `request` and waits for them all
    ///
    /// Seeds run in parallel, bounded by the global crawl cap. A failing seed
    /// is reported as an `error` event and never affects its siblings. When
    /// every seed is done, one `complete` event with an empty `url` is
    /// published for the request. Batch deliveries may still be running when
    /// this returns; see [`Orchestrator::wait_for_deliveries`].
    pub async fn start_crawl(&self, request: CrawlRequest) {
        let request_id = request.request_id.clone();
        if !self.inner.active.contains(&request_id) {
            self.inner.active.insert(
                &request_id,
                request.seeds.len(),
                self.inner.clock.now(),
            );
        }

        let mut seeds = JoinSet::new();
        for seed in request.non_blank_seeds() {
            let orchestrator = self.clone();
            let request_id = request_id.clone();
            let seed = seed.to_string();
            seeds.spawn(async move {
                orchestrator.run_seed(&request_id, &seed).await;
            });
        }

        while let Some(joined) = seeds.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Seed task for request {} failed: {}", request_id, e);
            }
        }

        self.inner.events.publish(
            ProgressEvent::new(EventKind::Complete, request_id.as_str(), "")
                .with_message("all seeds completed"),
        );
        self.inner.active.remove(&request_id);
        tracing::info!("Crawl request {} finished", request_id);
    }

    /// Runs one seed through its whole lifecycle
    async fn run_seed(&self, request_id: &str, seed: &str) {
        let events = &self.inner.events;
        events.publish(
            ProgressEvent::new(EventKind::Start, request_id, seed).with_message("started"),
        );

        if let Err(e) = self.crawl_seed(request_id, seed).await {
            tracing::warn!("Seed {} failed: {}", seed, e);
            events.publish(
                ProgressEvent::new(EventKind::Error, request_id, seed).with_message(e.to_string()),
            );
        }
    }

    async fn crawl_seed(&self, request_id: &str, seed: &str) -> Result<(), RelayError> {
        let seed_url =
            normalize_seed(seed).map_err(|e| RelayError::InvalidSeed(format!("{}: {}", seed, e)))?;
        // Events and the batch carry the seed as submitted
        let state = Arc::new(
            SeedCrawlState::new(
                request_id,
                seed_url,
                self.inner.config.crawler.max_pages_per_seed,
            )?
            .with_label(seed),
        );

        // Pending until a global slot frees up
        let _permit = tokio::select! {
            permit = self.inner.permits.clone().acquire_owned() => permit.ok(),
            _ = self.inner.cancel.cancelled() => None,
        };
        if self.inner.cancel.is_cancelled() {
            state.transition(SeedPhase::Done)?;
            return Ok(());
        }

        state.transition(SeedPhase::Crawling)?;
        tracing::info!("Crawling seed {} for request {}", state.seed(), request_id);
        self.inner.seed_crawler.crawl(state.clone()).await;

        state.transition(SeedPhase::Draining)?;
        let pages = state.take_pages();
        let archive = tokio::task::spawn_blocking(move || build_archive(&pages))
            .await
            .map_err(|e| RelayError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        let batch = PageBatch::from_archive(request_id, state.label(), archive);
        tracing::info!(
            "Seed {} archived: {} pages ({} ok, {} failed)",
            state.seed(),
            batch.total_pages,
            batch.stats.successful,
            batch.stats.failed
        );
        self.spawn_delivery(batch);

        state.transition(SeedPhase::Done)?;
        let done = state.processed();
        let total = state.enqueued();
        self.inner.events.publish(
            ProgressEvent::new(EventKind::Complete, request_id, state.label())
                .with_counts(done, total),
        );
        Ok(())
    }

    /// Delivers `batch` in the background, dead-lettering it on failure
    fn spawn_delivery(&self, batch: PageBatch) {
        let delivery = self.inner.delivery.clone();
        let dead_letter = self.inner.dead_letter.clone();
        let clock = self.inner.clock.clone();

        self.inner.deliveries.spawn(async move {
            let error = match delivery.send_batch(&batch).await {
                Ok(()) => return,
                Err(e) => e,
            };

            let Some(queue) = dead_letter else {
                tracing::error!(
                    "Batch {} for {} lost: dead-letter queue disabled ({})",
                    batch.batch_id,
                    batch.main_url,
                    error
                );
                delivery.record_lost();
                return;
            };

            let batch_id = batch.batch_id.clone();
            let record = FailedBatch::new(batch, error.to_string(), clock.now());
            match queue.enqueue(&record).await {
                Ok(()) => delivery.record_dead_lettered(),
                Err(e) => {
                    tracing::error!("Batch {} lost: dead-letter enqueue failed: {}", batch_id, e);
                    delivery.record_lost();
                }
            }
        });
    }

    /// Waits until every submitted request has finished crawling
    pub async fn wait_for_crawls(&self) {
        self.inner.crawls.close();
        self.inner.crawls.wait().await;
        self.inner.crawls.reopen();
    }

    /// Waits until every batch handed off so far is delivered or
    /// dead-lettered
    pub async fn wait_for_deliveries(&self) {
        self.inner.deliveries.close();
        self.inner.deliveries.wait().await;
        self.inner.deliveries.reopen();
    }

    /// Cancels running crawls, then waits for crawls and deliveries to wind
    /// down
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.wait_for_crawls().await;
        self.wait_for_deliveries().await;
    }
}
