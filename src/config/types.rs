use serde::Deserialize;

/// Main configuration structure for Crawl-Relay
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub analyzer: AnalyzerConfig,
    #[serde(rename = "dead-letter", default)]
    pub dead_letter: DeadLetterConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Upper bound on the visited set of a single seed
    #[serde(rename = "max-pages-per-seed")]
    pub max_pages_per_seed: usize,

    /// Number of fetch workers per seed
    #[serde(rename = "per-seed-workers")]
    pub per_seed_workers: usize,

    /// Number of seeds crawled at the same time across all requests
    #[serde(rename = "max-global-crawls")]
    pub max_global_crawls: usize,

    /// A progress event is published every N processed pages
    #[serde(rename = "progress-every-n")]
    pub progress_every_n: usize,

    /// Response bodies are truncated to this many bytes
    #[serde(rename = "max-page-bytes")]
    pub max_page_bytes: usize,

    /// Timeout of a single page fetch (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages_per_seed: 1000,
            per_seed_workers: 16,
            max_global_crawls: 128,
            progress_every_n: 10,
            max_page_bytes: 2 * 1024 * 1024,
            request_timeout_secs: 20,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the identifying header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Downstream analyzer delivery configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerConfig {
    /// Ingest endpoint batches are POSTed to
    pub url: String,

    /// Gzip the request body and send `Content-Encoding: gzip`
    #[serde(default = "default_true")]
    pub gzip: bool,

    /// Timeout of a single delivery attempt (seconds)
    #[serde(rename = "timeout-secs", default = "default_analyzer_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt
    #[serde(rename = "max-retries", default = "default_delivery_retries")]
    pub max_retries: u32,

    /// Base of the exponential backoff (milliseconds)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Response bodies are drained up to this many bytes
    #[serde(rename = "max-response-bytes", default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

/// Dead-letter queue configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeadLetterConfig {
    /// Redis connection string; the queue is disabled when absent
    #[serde(rename = "redis-url")]
    pub redis_url: Option<String>,

    /// Name of the Redis list holding failed batches
    #[serde(rename = "queue-name")]
    pub queue_name: String,

    /// TTL refreshed on the whole list at every enqueue (days)
    #[serde(rename = "ttl-days")]
    pub ttl_days: u64,

    /// Interval between redelivery passes (seconds)
    #[serde(rename = "retry-interval-secs")]
    pub retry_interval_secs: u64,

    /// Redelivery attempts before a batch is dropped for good
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for DeadLetterConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            queue_name: "dlq:failed-batches".to_string(),
            ttl_days: 30,
            retry_interval_secs: 300,
            max_retries: 5,
        }
    }
}

/// Progress event fan-out configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Mailbox size of each subscriber
    #[serde(rename = "channel-capacity")]
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// HTTP service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the service listens on
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_analyzer_timeout() -> u64 {
    120
}

fn default_delivery_retries() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    1000
}

fn default_max_response_bytes() -> usize {
    5 * 1024 * 1024
}
