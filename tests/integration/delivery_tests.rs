use crate::support::{build_harness, html_page, load_test_config, received_batches};
use crawl_relay::clock::SystemClock;
use crawl_relay::dead_letter::{DeadLetterQueue, DeadLetterWorker};
use crawl_relay::events::EventKind;
use crawl_relay::CrawlRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn single_page_site() -> MockServer {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&[]))
        .mount(&site)
        .await;
    site
}

#[tokio::test]
async fn test_exhausted_delivery_goes_to_dead_letter_queue() {
    let site = single_page_site().await;
    let analyzer = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&analyzer)
        .await;

    let config = load_test_config(&format!("{}/ingest", analyzer.uri()), 10, 2);
    let queue = DeadLetterQueue::in_memory("dlq:test", 5);
    let harness = build_harness(config, Some(queue.clone()));

    let request = CrawlRequest::new(vec![site.uri()]);
    let mut subscription = harness.events.subscribe(&request.request_id);
    harness.orchestrator.start_crawl(request.clone()).await;
    harness.orchestrator.wait_for_deliveries().await;

    let failures: Vec<_> = subscription
        .drain()
        .into_iter()
        .filter(|e| e.kind == EventKind::BatchDeliveryFailed)
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].done, 1);
    assert_eq!(failures[0].total, 1);

    assert_eq!(queue.len().await.unwrap(), 1);
    let record = queue.dequeue().await.unwrap().unwrap();
    assert_eq!(record.retry_count, 0);
    assert_eq!(record.batch.request_id, request.request_id);
    assert!(record.error.contains("500"));

    let counts = harness.delivery.counts();
    assert_eq!(counts.delivered, 0);
    assert_eq!(counts.dead_lettered, 1);
}

#[tokio::test]
async fn test_disabled_dead_letter_queue_loses_batch() {
    let site = single_page_site().await;
    let analyzer = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&analyzer)
        .await;

    let config = load_test_config(&format!("{}/ingest", analyzer.uri()), 10, 0);
    let harness = build_harness(config, None);

    harness
        .orchestrator
        .start_crawl(CrawlRequest::new(vec![site.uri()]))
        .await;
    harness.orchestrator.wait_for_deliveries().await;

    let counts = harness.delivery.counts();
    assert_eq!(counts.lost, 1);
    assert_eq!(counts.dead_lettered, 0);
}

#[tokio::test]
async fn test_dead_letter_worker_redelivers_after_recovery() {
    let site = single_page_site().await;
    let analyzer = MockServer::start().await;

    // Down for the first delivery and its single retry, then back up
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&analyzer)
        .await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&analyzer)
        .await;

    let config = load_test_config(&format!("{}/ingest", analyzer.uri()), 10, 1);
    let queue = DeadLetterQueue::in_memory("dlq:test", 5);
    let harness = build_harness(config, Some(queue.clone()));

    harness
        .orchestrator
        .start_crawl(CrawlRequest::new(vec![site.uri()]))
        .await;
    harness.orchestrator.wait_for_deliveries().await;
    assert_eq!(queue.len().await.unwrap(), 1);

    let worker = DeadLetterWorker::new(
        queue.clone(),
        harness.delivery.clone(),
        Arc::new(SystemClock),
        Duration::from_secs(60),
        CancellationToken::new(),
    );
    let outcome = worker.run_once().await.unwrap();
    assert_eq!(outcome.attempted, 1);
    assert_eq!(outcome.delivered, 1);
    assert!(queue.is_empty().await.unwrap());

    let batches = received_batches(&analyzer).await;
    assert_eq!(batches.len(), 3);
    let redelivered = batches.last().unwrap();
    assert_eq!(redelivered.batch_id, batches[0].batch_id);
    assert!(redelivered.is_complete);
    assert_eq!(harness.delivery.counts().delivered, 1);
}
