//! Breadth-first crawl of a single seed
//!
//! A fixed pool of workers pulls URLs from the seed's link queue, fetches
//! them, records the results and admits newly found same-host links. The
//! queue closes when the last admitted URL has been processed, or when the
//! crawl is cancelled.

use crate::crawler::{extract_same_host_links, PageFetcher};
use crate::events::{EventHub, EventKind, ProgressEvent};
use crate::state::SeedCrawlState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Everything a seed's workers share besides the seed state itself
#[derive(Clone)]
pub struct SeedCrawler {
    pub fetcher: PageFetcher,
    pub events: EventHub,
    pub workers: usize,
    pub progress_every_n: usize,
    pub cancel: CancellationToken,
}

/// Work queue with a count of admitted-but-unfinished URLs
///
/// The sender is dropped once that count returns to zero, which ends every
/// worker's receive loop.
struct LinkQueue {
    tx: Mutex<Option<mpsc::Sender<Url>>>,
    pending: AtomicUsize,
}

impl LinkQueue {
    fn new(tx: mpsc::Sender<Url>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
            pending: AtomicUsize::new(0),
        }
    }

    /// Queues an admitted URL; false if the queue is already closed
    fn push(&self, url: Url) -> bool {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let sent = match guard.as_ref() {
            Some(tx) => tx.try_send(url).is_ok(),
            None => false,
        };
        drop(guard);

        if !sent {
            self.finish_one();
        }
        sent
    }

    /// Marks one queued URL as fully processed
    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.close();
        }
    }

    fn close(&self) {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl SeedCrawler {
    /// Crawls `state`'s seed until its queue drains or the crawl is cancelled
    ///
    /// Fetched pages accumulate in `state`; nothing is returned. The seed is
    /// admitted first, so the page cap must be at least 1.
    pub async fn crawl(&self, state: Arc<SeedCrawlState>) {
        // Every admission is bounded by the visited cap, so try_send never
        // finds the channel full
        let (tx, rx) = mpsc::channel(state.max_pages().max(1));
        let queue = Arc::new(LinkQueue::new(tx));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let seed = state.seed().clone();
        if !state.try_admit(&seed) || !queue.push(seed) {
            tracing::warn!("Seed {} could not be queued", state.seed());
            return;
        }

        let mut workers = JoinSet::new();
        for worker_id in 0..self.workers.max(1) {
            let crawler = self.clone();
            let state = state.clone();
            let queue = queue.clone();
            let rx = rx.clone();
            workers.spawn(async move {
                crawler.work(worker_id, state, queue, rx).await;
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Seed worker for {} failed: {}", state.seed(), e);
            }
        }

        // A worker that panicked never finished its URL
        queue.close();

        tracing::debug!(
            "Seed {} drained: {} processed, {} enqueued",
            state.seed(),
            state.processed(),
            state.enqueued()
        );
    }

    async fn work(
        &self,
        worker_id: usize,
        state: Arc<SeedCrawlState>,
        queue: Arc<LinkQueue>,
        rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Url>>>,
    ) {
        loop {
            let next = {
                let mut rx = rx.lock().await;
                tokio::select! {
                    _ = self.cancel.cancelled() => None,
                    url = rx.recv() => url,
                }
            };

            let Some(url) = next else {
                break;
            };

            self.process(&state, &queue, url).await;
            queue.finish_one();

            if self.cancel.is_cancelled() {
                queue.close();
                break;
            }
        }

        tracing::trace!("Worker {} for {} exiting", worker_id, state.seed());
    }

    /// Fetches one URL, records it, and admits its links
    async fn process(&self, state: &SeedCrawlState, queue: &LinkQueue, url: Url) {
        let page = self.fetcher.fetch_page(url.as_str()).await;

        let links = if page.is_html() {
            extract_same_host_links(&page.html, &url)
        } else {
            Vec::new()
        };

        let done = state.record_page(page);
        let total = state.enqueued();

        if self.progress_every_n > 0 && done % self.progress_every_n == 0 {
            self.events.publish(
                ProgressEvent::new(EventKind::Progress, state.request_id(), state.label())
                    .with_counts(done, total),
            );
        }

        if done >= state.max_pages() {
            if state.mark_limit_reached() {
                tracing::info!(
                    "Seed {} reached its limit of {} pages",
                    state.seed(),
                    state.max_pages()
                );
                self.events.publish(
                    ProgressEvent::new(
                        EventKind::LimitReached,
                        state.request_id(),
                        state.label(),
                    )
                    .with_counts(done, total)
                    .with_message(format!(
                        "Reached max crawl limit of {} pages",
                        state.max_pages()
                    )),
                );
            }
            return;
        }

        for link in links {
            if state.try_admit(&link) {
                tracing::trace!("Queued {}", link);
                queue.push(link);
            }
        }
    }
}
