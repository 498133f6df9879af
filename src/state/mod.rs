//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `SeedPhase`: Lifecycle of one seed crawl (pending, crawling, draining, done)
//! - `SeedCrawlState`: Per-seed visited set, counters and page buffer

mod seed_phase;
mod seed_state;

// Re-export main types
pub use seed_phase::SeedPhase;
pub use seed_state::SeedCrawlState;
