use crate::crawler::PageResult;
use crate::state::SeedPhase;
use crate::url::{host_key, same_host};
use crate::{RelayError, UrlError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use url::Url;

/// Mutable state of one seed's breadth-first crawl
///
/// Shared by the seed's workers; never shared across seeds. The visited set
/// and the page buffer each sit behind their own mutex, counters are atomics.
#[derive(Debug)]
pub struct SeedCrawlState {
    request_id: String,
    seed: Url,
    label: String,
    host: String,
    max_pages: usize,
    visited: Mutex<HashSet<String>>,
    pages: Mutex<Vec<PageResult>>,
    processed: AtomicUsize,
    enqueued: AtomicUsize,
    limit_reached: AtomicBool,
    phase: Mutex<SeedPhase>,
}

impl SeedCrawlState {
    /// Creates the state for `seed`, which must already be normalized
    ///
    /// # Returns
    ///
    /// * `Ok(SeedCrawlState)` - State in the `Pending` phase
    /// * `Err(RelayError)` - The seed has no host
    pub fn new(
        request_id: impl Into<String>,
        seed: Url,
        max_pages: usize,
    ) -> Result<Self, RelayError> {
        let host = host_key(&seed).ok_or(UrlError::MissingHost)?;
        Ok(Self {
            request_id: request_id.into(),
            label: seed.as_str().to_string(),
            seed,
            host,
            max_pages,
            visited: Mutex::new(HashSet::new()),
            pages: Mutex::new(Vec::new()),
            processed: AtomicUsize::new(0),
            enqueued: AtomicUsize::new(0),
            limit_reached: AtomicBool::new(false),
            phase: Mutex::new(SeedPhase::Pending),
        })
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }

    /// Sets the seed as it was submitted, before normalization
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// The `url` of every event and batch about this seed
    ///
    /// Defaults to the normalized seed.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Lowercase host (with explicit port) every admitted link must share
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Decides whether `link` joins the crawl, and marks it visited if so
    ///
    /// A link is admitted only if it is on the seed's host, the page limit has
    /// not fired, the visited set is below the page cap and the link has not
    /// been seen. Capacity check and insert happen under one lock, so two
    /// workers can never both take the last slot.
    pub fn try_admit(&self, link: &Url) -> bool {
        if !same_host(&self.host, link) || self.limit_reached() {
            return false;
        }

        let mut visited = lock(&self.visited);
        if visited.len() >= self.max_pages {
            return false;
        }
        if !visited.insert(link.as_str().to_string()) {
            return false;
        }
        self.enqueued.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Appends a fetched page to the batch buffer and returns the new
    /// `processed` count
    pub fn record_page(&self, page: PageResult) -> usize {
        lock(&self.pages).push(page);
        self.processed.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Flags the page cap as reached; returns true only for the first caller
    pub fn mark_limit_reached(&self) -> bool {
        !self.limit_reached.swap(true, Ordering::SeqCst)
    }

    pub fn limit_reached(&self) -> bool {
        self.limit_reached.load(Ordering::SeqCst)
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn enqueued(&self) -> usize {
        self.enqueued.load(Ordering::SeqCst)
    }

    pub fn visited_len(&self) -> usize {
        lock(&self.visited).len()
    }

    pub fn is_visited(&self, link: &str) -> bool {
        lock(&self.visited).contains(link)
    }

    /// Takes the buffered pages, leaving the buffer empty
    pub fn take_pages(&self) -> Vec<PageResult> {
        std::mem::take(&mut *lock(&self.pages))
    }

    pub fn phase(&self) -> SeedPhase {
        *lock(&self.phase)
    }

    /// Moves the seed to `next`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Transition applied
    /// * `Err(RelayError::InvalidTransition)` - `next` is not reachable
    pub fn transition(&self, next: SeedPhase) -> Result<(), RelayError> {
        let mut phase = lock(&self.phase);
        if !phase.can_transition_to(next) {
            return Err(RelayError::InvalidTransition {
                from: *phase,
                to: next,
            });
        }
        tracing::trace!("Seed {} phase {} -> {}", self.seed, *phase, next);
        *phase = next;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
