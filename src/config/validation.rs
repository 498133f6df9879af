use crate::config::types::{
    AnalyzerConfig, Config, CrawlerConfig, DeadLetterConfig, EventsConfig, ServerConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use std::net::SocketAddr;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_analyzer_config(&config.analyzer)?;
    validate_dead_letter_config(&config.dead_letter)?;
    validate_events_config(&config.events)?;
    validate_server_config(&config.server)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let positive = [
        ("max_pages_per_seed", config.max_pages_per_seed),
        ("per_seed_workers", config.per_seed_workers),
        ("max_global_crawls", config.max_global_crawls),
        ("progress_every_n", config.progress_every_n),
        ("max_page_bytes", config.max_page_bytes),
    ];
    for (name, value) in positive {
        if value < 1 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 1, got {}",
                name, value
            )));
        }
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates analyzer delivery configuration
fn validate_analyzer_config(config: &AnalyzerConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid analyzer url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "analyzer url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "analyzer timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_response_bytes < 1 {
        return Err(ConfigError::Validation(
            "max_response_bytes must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates dead-letter queue configuration
fn validate_dead_letter_config(config: &DeadLetterConfig) -> Result<(), ConfigError> {
    if let Some(redis_url) = &config.redis_url {
        let url = Url::parse(redis_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid redis_url: {}", e)))?;
        if url.scheme() != "redis" && url.scheme() != "rediss" {
            return Err(ConfigError::Validation(format!(
                "redis_url must use redis or rediss, got '{}'",
                url.scheme()
            )));
        }
    }

    if config.queue_name.is_empty() {
        return Err(ConfigError::Validation(
            "queue_name cannot be empty".to_string(),
        ));
    }

    if config.retry_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "retry_interval_secs must be >= 1".to_string(),
        ));
    }

    if config.ttl_days < 1 {
        return Err(ConfigError::Validation("ttl_days must be >= 1".to_string()));
    }

    Ok(())
}

fn validate_events_config(config: &EventsConfig) -> Result<(), ConfigError> {
    if config.channel_capacity < 1 {
        return Err(ConfigError::Validation(
            "channel_capacity must be >= 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_server_config(config: &ServerConfig) -> Result<(), ConfigError> {
    config.bind.parse::<SocketAddr>().map_err(|e| {
        ConfigError::Validation(format!("Invalid bind address '{}': {}", config.bind, e))
    })?;
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
