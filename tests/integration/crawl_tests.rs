use crate::support::{archive_entries, build_harness, html_page, load_test_config, received_batches};
use crawl_relay::events::{EventKind, ProgressEvent};
use crawl_relay::CrawlRequest;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn accepting_analyzer() -> MockServer {
    let analyzer = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&analyzer)
        .await;
    analyzer
}

fn of_kind(events: &[ProgressEvent], kind: EventKind) -> Vec<&ProgressEvent> {
    events.iter().filter(|e| e.kind == kind).collect()
}

#[tokio::test]
async fn test_full_crawl_single_seed() {
    let site = MockServer::start().await;
    let analyzer = accepting_analyzer().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&["/about", "/contact", "https://other.test/x"]))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html_page(&["/", "/contact"]))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/contact"))
        .respond_with(html_page(&["/about"]))
        .mount(&site)
        .await;

    let config = load_test_config(&format!("{}/ingest", analyzer.uri()), 100, 0);
    let harness = build_harness(config, None);

    let request = CrawlRequest::new(vec![site.uri()]);
    let mut subscription = harness.events.subscribe(&request.request_id);
    harness.orchestrator.start_crawl(request.clone()).await;
    harness.orchestrator.wait_for_deliveries().await;

    let events = subscription.drain();
    assert_eq!(of_kind(&events, EventKind::Start).len(), 1);
    assert!(of_kind(&events, EventKind::LimitReached).is_empty());

    let completes = of_kind(&events, EventKind::Complete);
    assert_eq!(completes.len(), 2, "one per seed plus one per request");
    let seed_complete = completes.iter().find(|e| !e.url.is_empty()).unwrap();
    assert_eq!(seed_complete.done, 3);
    assert_eq!(seed_complete.total, 3);
    assert_eq!(seed_complete.percent, 100.0);

    // The request-level complete is the last event of the request
    let last = events.last().unwrap();
    assert_eq!(last.kind, EventKind::Complete);
    assert_eq!(last.url, "");
    assert_eq!(last.request_id, request.request_id);

    let batches = received_batches(&analyzer).await;
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.request_id, request.request_id);
    assert_eq!(batch.main_url, site.uri());
    assert_eq!(batch.batch_num, 1);
    assert!(batch.is_complete);
    assert_eq!(batch.total_pages, 3);
    assert_eq!(batch.metadata.len(), batch.total_pages);
    assert_eq!(batch.stats.successful + batch.stats.failed, batch.total_pages);
    assert_eq!(batch.stats.successful, 3);
    assert_eq!(batch.compression, "zip-base64");

    let entries = archive_entries(batch);
    assert_eq!(entries.len(), 3);
    for meta in &batch.metadata {
        assert!(meta.has_html);
        let name = meta.file_name.as_ref().unwrap();
        assert!(entries.iter().any(|(entry, _)| entry == name));
    }

    assert!(harness.orchestrator.active().is_empty());
    assert_eq!(harness.delivery.counts().delivered, 1);
}

#[tokio::test]
async fn test_page_cap_stops_crawl() {
    let site = MockServer::start().await;
    let analyzer = accepting_analyzer().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&["/b"]))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html_page(&["/c"]))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(html_page(&[]))
        .expect(0)
        .mount(&site)
        .await;

    let config = load_test_config(&format!("{}/ingest", analyzer.uri()), 2, 0);
    let harness = build_harness(config, None);

    let request = CrawlRequest::new(vec![site.uri()]);
    let mut subscription = harness.events.subscribe(&request.request_id);
    harness.orchestrator.start_crawl(request).await;
    harness.orchestrator.wait_for_deliveries().await;

    let events = subscription.drain();
    let limits = of_kind(&events, EventKind::LimitReached);
    assert_eq!(limits.len(), 1);
    assert_eq!(limits[0].done, 2);
    assert!(limits[0].message.as_ref().unwrap().contains('2'));

    let batches = received_batches(&analyzer).await;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].total_pages, 2);
    assert!(!batches[0].metadata.iter().any(|m| m.url.ends_with("/c")));
}

#[tokio::test]
async fn test_invalid_seed_does_not_affect_sibling() {
    let site = MockServer::start().await;
    let analyzer = accepting_analyzer().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&[]))
        .mount(&site)
        .await;

    let config = load_test_config(&format!("{}/ingest", analyzer.uri()), 10, 0);
    let harness = build_harness(config, None);

    let request = CrawlRequest::new(vec![
        "ftp://files.example.com/".to_string(),
        "   ".to_string(),
        site.uri(),
    ]);
    let mut subscription = harness.events.subscribe(&request.request_id);
    harness.orchestrator.start_crawl(request).await;
    harness.orchestrator.wait_for_deliveries().await;

    let events = subscription.drain();

    let errors = of_kind(&events, EventKind::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].url, "ftp://files.example.com/");
    assert!(errors[0].message.is_some());

    // Blank seeds are skipped without any event
    assert_eq!(of_kind(&events, EventKind::Start).len(), 2);

    let completes = of_kind(&events, EventKind::Complete);
    assert_eq!(completes.len(), 2);
    assert!(completes.iter().any(|e| e.url == site.uri()));
    assert_eq!(events.last().unwrap().url, "");

    assert_eq!(received_batches(&analyzer).await.len(), 1);
}

#[tokio::test]
async fn test_non_html_and_unreachable_pages() {
    let site = MockServer::start().await;
    let analyzer = accepting_analyzer().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&["/data.json"]))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"html":"<a href='/hidden'>x</a>"}"#, "application/json"),
        )
        .mount(&site)
        .await;
    // Links are only extracted from HTML responses
    Mock::given(method("GET"))
        .and(path("/hidden"))
        .respond_with(html_page(&[]))
        .expect(0)
        .mount(&site)
        .await;

    let config = load_test_config(&format!("{}/ingest", analyzer.uri()), 10, 0);
    let harness = build_harness(config, None);

    // The second seed's host refuses connections
    let request = CrawlRequest::new(vec![site.uri(), "http://127.0.0.1:9/".to_string()]);
    harness.orchestrator.start_crawl(request).await;
    harness.orchestrator.wait_for_deliveries().await;

    let batches = received_batches(&analyzer).await;
    assert_eq!(batches.len(), 2);

    let site_batch = batches
        .iter()
        .find(|b| b.main_url == site.uri())
        .unwrap();
    assert_eq!(site_batch.total_pages, 2);
    let json_page = site_batch
        .metadata
        .iter()
        .find(|m| m.url.ends_with("/data.json"))
        .unwrap();
    assert_eq!(json_page.content_type, "application/json");
    assert!(json_page.error.is_none());

    let dead_batch = batches
        .iter()
        .find(|b| b.main_url == "http://127.0.0.1:9/")
        .unwrap();
    assert_eq!(dead_batch.total_pages, 1);
    assert_eq!(dead_batch.stats.failed, 1);
    assert_eq!(dead_batch.stats.successful, 0);
    assert!(dead_batch.metadata[0].error.is_some());
    assert!(dead_batch.metadata[0].file_name.is_none());
}

#[tokio::test]
async fn test_global_subscriber_sees_all_requests() {
    let site = MockServer::start().await;
    let analyzer = accepting_analyzer().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&[]))
        .mount(&site)
        .await;

    let config = load_test_config(&format!("{}/ingest", analyzer.uri()), 10, 0);
    let harness = build_harness(config, None);

    let mut global = harness.events.subscribe(crawl_relay::events::GLOBAL);
    let first = harness.orchestrator.submit(vec![site.uri()]);
    let second = harness.orchestrator.submit(vec![site.uri()]);
    harness.orchestrator.wait_for_crawls().await;
    harness.orchestrator.wait_for_deliveries().await;

    let events = global.drain();
    for id in [&first, &second] {
        assert!(events
            .iter()
            .any(|e| &e.request_id == id && e.kind == EventKind::Complete && e.url.is_empty()));
    }
    assert!(harness.orchestrator.active().is_empty());
}

#[tokio::test]
async fn test_seed_events_share_submitted_url() {
    let site = MockServer::start().await;
    let analyzer = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&analyzer)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&["/a", "/b"]))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html_page(&["/b"]))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html_page(&["/a"]))
        .mount(&site)
        .await;

    let config = load_test_config(&format!("{}/ingest", analyzer.uri()), 2, 0);
    let harness = build_harness(config, None);

    // Submitted without a trailing slash; normalization adds one
    let seed = site.uri();
    let request = CrawlRequest::new(vec![seed.clone()]);
    let mut subscription = harness.events.subscribe(&request.request_id);
    harness.orchestrator.start_crawl(request).await;
    harness.orchestrator.wait_for_deliveries().await;

    let events = subscription.drain();
    let seed_events: Vec<&ProgressEvent> = events.iter().filter(|e| !e.url.is_empty()).collect();
    for kind in [
        EventKind::Start,
        EventKind::Progress,
        EventKind::LimitReached,
        EventKind::Complete,
        EventKind::BatchDeliveryFailed,
    ] {
        assert!(
            seed_events.iter().any(|e| e.kind == kind),
            "missing {} event",
            kind
        );
    }
    for event in &seed_events {
        assert_eq!(event.url, seed, "{} event", event.kind);
    }
}

#[tokio::test]
async fn test_crawl_completion_outlives_dropped_events() {
    let site = MockServer::start().await;
    let analyzer = accepting_analyzer().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&["/a"]))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html_page(&[]))
        .mount(&site)
        .await;

    let mut config = load_test_config(&format!("{}/ingest", analyzer.uri()), 10, 0);
    config.events.channel_capacity = 1;
    let harness = build_harness(config, None);

    // Nobody reads while the crawl runs, so the mailbox keeps only the first event
    let request = CrawlRequest::new(vec![site.uri()]);
    let mut subscription = harness.events.subscribe(&request.request_id);
    let crawl = harness.orchestrator.start_crawl(request);
    tokio::time::timeout(std::time::Duration::from_secs(10), crawl)
        .await
        .expect("crawl did not finish");
    harness.orchestrator.wait_for_deliveries().await;

    let events = subscription.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Start);
    assert!(subscription.dropped() > 0);
    assert!(!events
        .iter()
        .any(|e| e.kind == EventKind::Complete && e.url.is_empty()));

    assert_eq!(received_batches(&analyzer).await.len(), 1);
    assert!(harness.orchestrator.active().is_empty());
}
