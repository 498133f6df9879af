//! Crawl-Relay: a bulk site crawler with reliable batch delivery
//!
//! This crate crawls a set of seed sites breadth-first, streams live progress
//! to observers, packages each seed's pages into a compressed batch and
//! delivers it to a downstream analyzer, falling back to a durable dead-letter
//! queue when delivery permanently fails.

pub mod archive;
pub mod clock;
pub mod config;
pub mod crawler;
pub mod dead_letter;
pub mod delivery;
pub mod events;
pub mod server;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Crawl-Relay operations
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] archive::ArchiveError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] delivery::DeliveryError),

    #[error("Dead letter error: {0}")]
    DeadLetter(#[from] dead_letter::DeadLetterError),

    #[error("Invalid seed phase transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::SeedPhase,
        to: state::SeedPhase,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Crawl-Relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlRequest, Orchestrator};
pub use events::{EventHub, EventKind, ProgressEvent};
pub use state::SeedPhase;
