//! Crawl-Relay main entry point
//!
//! This is the command-line interface for the Crawl-Relay crawl and delivery
//! service.

use clap::Parser;
use crawl_relay::clock::{Clock, SystemClock};
use crawl_relay::config::{load_config_with_hash, Config};
use crawl_relay::dead_letter::{DeadLetterQueue, DeadLetterWorker};
use crawl_relay::delivery::DeliveryClient;
use crawl_relay::events::{EventHub, Subscription};
use crawl_relay::server::{self, AppState};
use crawl_relay::{CrawlRequest, Orchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Crawl-Relay: bulk site crawler with reliable batch delivery
///
/// Crawl-Relay crawls seed sites breadth-first, streams progress events,
/// and delivers each seed's pages as one compressed batch to an analyzer,
/// keeping undeliverable batches in a dead-letter queue for later retries.
#[derive(Parser, Debug)]
#[command(name = "crawl-relay")]
#[command(version = "1.0.0")]
#[command(about = "Bulk site crawler with reliable batch delivery", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config, print the effective settings and exit
    #[arg(long, conflicts_with = "seed")]
    dry_run: bool,

    /// Crawl this seed once and exit instead of running the HTTP service
    /// (repeatable)
    #[arg(long, value_name = "URL")]
    seed: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let config = Arc::new(config);
    let cancel = CancellationToken::new();
    let (orchestrator, dead_letter_worker) =
        build_orchestrator(config.clone(), cancel.clone()).await?;

    if cli.seed.is_empty() {
        handle_serve(&config, &orchestrator, cancel.clone()).await?;
    } else {
        handle_one_shot(&orchestrator, cli.seed).await?;
    }

    orchestrator.shutdown().await;
    if let Some(worker) = dead_letter_worker {
        if let Err(e) = worker.await {
            tracing::error!("Dead-letter worker failed: {}", e);
        }
    }
    log_delivery_counts(&orchestrator);

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawl_relay=info,warn"),
            1 => EnvFilter::new("crawl_relay=debug,info"),
            2 => EnvFilter::new("crawl_relay=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr so one-shot event lines on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Wires the event hub, delivery client, dead-letter queue and worker
///
/// The worker, when the queue is enabled, runs until `cancel` fires; its
/// handle is returned so shutdown can wait for it.
async fn build_orchestrator(
    config: Arc<Config>,
    cancel: CancellationToken,
) -> Result<(Orchestrator, Option<JoinHandle<()>>), Box<dyn std::error::Error>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let events = EventHub::new(config.events.channel_capacity);
    let delivery = DeliveryClient::new(
        &config.analyzer,
        &config.user_agent,
        events.clone(),
        clock.clone(),
    )?
    .with_cancellation(cancel.clone());

    let dead_letter = DeadLetterQueue::connect(&config.dead_letter).await;
    let worker = dead_letter.as_ref().map(|queue| {
        let worker = DeadLetterWorker::new(
            queue.clone(),
            delivery.clone(),
            clock.clone(),
            Duration::from_secs(config.dead_letter.retry_interval_secs),
            cancel.clone(),
        );
        tokio::spawn(worker.run())
    });

    let orchestrator = Orchestrator::new(config, events, delivery, dead_letter, clock, cancel)?;
    Ok((orchestrator, worker))
}

/// Handles the --dry-run mode: prints the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Crawl-Relay Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max pages per seed: {}", config.crawler.max_pages_per_seed);
    println!("  Workers per seed: {}", config.crawler.per_seed_workers);
    println!("  Max global crawls: {}", config.crawler.max_global_crawls);
    println!("  Progress every: {} pages", config.crawler.progress_every_n);
    println!("  Max page bytes: {}", config.crawler.max_page_bytes);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nAnalyzer:");
    println!("  URL: {}", config.analyzer.url);
    println!("  Gzip: {}", config.analyzer.gzip);
    println!("  Timeout: {}s", config.analyzer.timeout_secs);
    println!("  Max retries: {}", config.analyzer.max_retries);
    println!("  Backoff base: {}ms", config.analyzer.backoff_base_ms);

    println!("\nDead Letter Queue:");
    match &config.dead_letter.redis_url {
        Some(url) => println!("  Redis: {}", url),
        None => println!("  Redis: (disabled)"),
    }
    println!("  Queue: {}", config.dead_letter.queue_name);
    println!("  TTL: {} days", config.dead_letter.ttl_days);
    println!("  Retry interval: {}s", config.dead_letter.retry_interval_secs);
    println!("  Max retries: {}", config.dead_letter.max_retries);

    println!("\nEvents:");
    println!("  Subscriber capacity: {}", config.events.channel_capacity);

    println!("\nServer:");
    println!("  Bind: {}", config.server.bind);

    println!("\n✓ Configuration is valid");
}

/// Runs the HTTP service until Ctrl-C
async fn handle_serve(
    config: &Config,
    orchestrator: &Orchestrator,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState {
        orchestrator: orchestrator.clone(),
        shutdown: cancel.clone(),
    };

    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
        }
        signal.cancel();
    });

    server::serve(&config.server.bind, state).await?;
    Ok(())
}

/// Crawls `seeds` once, printing every event of the request as a JSON line
///
/// Completion is taken from the crawl itself, not from the final event,
/// since a full mailbox may drop events.
async fn handle_one_shot(
    orchestrator: &Orchestrator,
    seeds: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = CrawlRequest::new(seeds);
    let mut subscription = orchestrator.events().subscribe(&request.request_id);

    let crawl = orchestrator.start_crawl(request);
    tokio::pin!(crawl);
    loop {
        tokio::select! {
            _ = &mut crawl => break,
            Some(event) = subscription.recv() => {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
    }

    tracing::info!("Crawl finished, waiting for batch deliveries");
    orchestrator.wait_for_deliveries().await;
    print_buffered(&mut subscription)?;

    if subscription.dropped() > 0 {
        tracing::warn!("{} progress events were dropped", subscription.dropped());
    }
    Ok(())
}

fn print_buffered(subscription: &mut Subscription) -> Result<(), serde_json::Error> {
    for event in subscription.drain() {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

fn log_delivery_counts(orchestrator: &Orchestrator) {
    let counts = orchestrator.delivery().counts();
    tracing::info!(
        "Batches: {} delivered, {} dead-lettered, {} lost",
        counts.delivered,
        counts.dead_lettered,
        counts.lost
    );
}
