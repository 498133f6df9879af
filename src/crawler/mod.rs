//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - Bounded HTTP fetching of single pages
//! - HTML parsing and same-host link extraction
//! - Per-seed breadth-first crawling with a worker pool
//! - Orchestration of multi-seed requests and batch hand-off

mod coordinator;
mod fetcher;
mod parser;
mod registry;
mod seed;

pub use coordinator::{CrawlRequest, Orchestrator};
pub use fetcher::{build_http_client, normalize_content_type, PageFetcher, PageResult};
pub use parser::extract_same_host_links;
pub use registry::{ActiveCrawl, ActiveCrawls};
pub use seed::SeedCrawler;
