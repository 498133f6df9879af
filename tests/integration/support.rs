//! Shared fixtures: config files, orchestrator wiring, mock responses and
//! batch decoding

use base64::Engine;
use crawl_relay::clock::{Clock, SystemClock};
use crawl_relay::config::{load_config, Config};
use crawl_relay::dead_letter::DeadLetterQueue;
use crawl_relay::delivery::{DeliveryClient, PageBatch};
use crawl_relay::events::EventHub;
use crawl_relay::Orchestrator;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use wiremock::{MockServer, ResponseTemplate};

/// Writes a config file pointing at `analyzer_url` and loads it back
pub fn load_test_config(analyzer_url: &str, max_pages: usize, analyzer_retries: u32) -> Config {
    let content = format!(
        r#"
[crawler]
max-pages-per-seed = {max_pages}
per-seed-workers = 4
max-global-crawls = 4
progress-every-n = 1
request-timeout-secs = 5

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[analyzer]
url = "{analyzer_url}"
gzip = false
timeout-secs = 5
max-retries = {analyzer_retries}
backoff-base-ms = 1
"#
    );

    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file.flush().expect("Failed to flush config");
    load_config(file.path()).expect("Failed to load test config")
}

/// Orchestrator plus the pieces tests inspect directly
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub delivery: DeliveryClient,
    pub events: EventHub,
}

pub fn build_harness(config: Config, dead_letter: Option<DeadLetterQueue>) -> Harness {
    let config = Arc::new(config);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let events = EventHub::new(config.events.channel_capacity);
    let delivery = DeliveryClient::new(
        &config.analyzer,
        &config.user_agent,
        events.clone(),
        clock.clone(),
    )
    .expect("Failed to build delivery client");

    let orchestrator = Orchestrator::new(
        config,
        events.clone(),
        delivery.clone(),
        dead_letter,
        clock,
        CancellationToken::new(),
    )
    .expect("Failed to build orchestrator");

    Harness {
        orchestrator,
        delivery,
        events,
    }
}

/// An HTML page linking to each of `links`
pub fn html_page(links: &[&str]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();
    let body = format!("<html><body>{}</body></html>", anchors);
    ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/html; charset=utf-8")
}

/// Every batch body the analyzer mock has received, in arrival order
pub async fn received_batches(analyzer: &MockServer) -> Vec<PageBatch> {
    analyzer
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| serde_json::from_slice(&request.body).expect("Batch body is not JSON"))
        .collect()
}

/// Decodes a batch's archive into (entry name, content) pairs
pub fn archive_entries(batch: &PageBatch) -> Vec<(String, String)> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&batch.archive_payload)
        .expect("Payload is not base64");
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).expect("Payload is not a zip");

    let mut entries = Vec::new();
    for i in 0..zip.len() {
        let mut file = zip.by_index(i).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        entries.push((file.name().to_string(), content));
    }
    entries
}
