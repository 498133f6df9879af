use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// An in-flight crawl request as shown by the `/active` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveCrawl {
    pub request_id: String,
    pub started_at: DateTime<Utc>,
    pub url_count: usize,
}

/// Registry of crawl requests that have been submitted and not yet finished
#[derive(Debug, Clone, Default)]
pub struct ActiveCrawls {
    inner: Arc<RwLock<HashMap<String, ActiveCrawl>>>,
}

impl ActiveCrawls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, request_id: &str, url_count: usize, started_at: DateTime<Utc>) {
        let entry = ActiveCrawl {
            request_id: request_id.to_string(),
            started_at,
            url_count,
        };
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request_id.to_string(), entry);
    }

    pub fn remove(&self, request_id: &str) -> Option<ActiveCrawl> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(request_id)
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(request_id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot ordered by start time, oldest first
    pub fn list(&self) -> Vec<ActiveCrawl> {
        let mut crawls: Vec<ActiveCrawl> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        crawls.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.request_id.cmp(&b.request_id))
        });
        crawls
    }
}
