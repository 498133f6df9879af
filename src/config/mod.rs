//! Configuration module for Crawl-Relay
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! The resulting [`Config`] is built once at startup and handed to every
//! component's constructor.
//!
//! # Example
//!
//! ```no_run
//! use crawl_relay::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Pages per seed: {}", config.crawler.max_pages_per_seed);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AnalyzerConfig, Config, CrawlerConfig, DeadLetterConfig, EventsConfig, ServerConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
