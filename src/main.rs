use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use feedbot::cli::{Cli, Commands};
use feedbot::config::Config;
use feedbot::domain::{DeliveryTarget, Feed};
use feedbot::errors::{FeederError, FeederResult};
use feedbot::services::{
    CycleReport, Dispatcher, FeedService, RetryPolicy, Scheduler, SchedulerHandle,
    SchedulerStatus,
};
use feedbot::sources::{FeedSource, RssAtomSource};
use feedbot::storage::{
    MemoryStateStore, SqliteFeedRepository, SqliteStateStore, SqliteStorage, StateStore,
};
use feedbot::transport::{ConsoleTransport, TelegramTransport, Transport};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feedbot=info")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env().context("loading configuration")?;

    // Initialize storage
    let storage = SqliteStorage::new(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path))?;
    let feed_repo = SqliteFeedRepository::new(storage.clone());
    let state_store = SqliteStateStore::new(storage);

    match cli.command {
        Commands::Add {
            name,
            url,
            no_validate,
        } => cmd_add(&name, &url, !no_validate, feed_repo, &config),
        Commands::Remove { name } => cmd_remove(&name, feed_repo, &config),
        Commands::List => cmd_list(feed_repo, &config),
        Commands::Status { json } => cmd_status(feed_repo, state_store, &config, json),
        Commands::Check { dry_run } => cmd_poll(feed_repo, state_store, &config, dry_run, true),
        Commands::Run { dry_run } => cmd_poll(feed_repo, state_store, &config, dry_run, false),
    }?;

    Ok(())
}

fn cmd_add(
    name: &str,
    url: &str,
    validate: bool,
    feed_repo: SqliteFeedRepository,
    config: &Config,
) -> FeederResult<()> {
    let service = FeedService::new(feed_repo, RssAtomSource::new(config.fetch_limit));

    if validate {
        println!("Validating feed: {}", url);
    }

    match service.add(name, url, validate) {
        Ok(feed) => {
            println!("Feed added successfully!");
            println!("  Name: {}", feed.name);
            println!("  URL: {}", feed.url);
            Ok(())
        }
        Err(FeederError::FeedAlreadyExists(_)) => {
            println!("Feed already exists: {}", name);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn cmd_remove(name: &str, feed_repo: SqliteFeedRepository, config: &Config) -> FeederResult<()> {
    let service = FeedService::new(feed_repo, RssAtomSource::new(config.fetch_limit));
    let feed = service.remove_by_name(name)?;
    println!("Removed: {} ({})", feed.name, feed.url);
    Ok(())
}

fn cmd_list(feed_repo: SqliteFeedRepository, config: &Config) -> FeederResult<()> {
    let feeds = FeedService::new(feed_repo, RssAtomSource::new(config.fetch_limit)).list()?;

    if feeds.is_empty() {
        println!("No feeds configured.");
        return Ok(());
    }

    println!("Configured feeds:\n");
    for (i, feed) in feeds.iter().enumerate() {
        println!("  {}. {}", i + 1, feed.name);
        println!("     {}", feed.url);
    }

    Ok(())
}

fn cmd_status(
    feed_repo: SqliteFeedRepository,
    state_store: SqliteStateStore,
    config: &Config,
    json: bool,
) -> FeederResult<()> {
    let feed_count = FeedService::new(feed_repo, RssAtomSource::new(config.fetch_limit))
        .list()?
        .len();
    let status = SchedulerStatus::from_store(&state_store, feed_count, &config.scheduler);

    if json {
        let rendered = serde_json::to_string_pretty(&status)
            .map_err(|e| FeederError::InvalidInput(e.to_string()))?;
        println!("{}", rendered);
    } else {
        print_status(&status);
    }

    Ok(())
}

fn cmd_poll(
    feed_repo: SqliteFeedRepository,
    state_store: SqliteStateStore,
    config: &Config,
    dry_run: bool,
    once: bool,
) -> FeederResult<()> {
    let service = FeedService::new(feed_repo, RssAtomSource::new(config.fetch_limit));
    let source = RssAtomSource::new(config.fetch_limit);

    if dry_run {
        let feeds = load_feeds(&service)?;
        if feeds.is_empty() {
            return Ok(());
        }

        println!("Dry run: messages are printed, state is not saved.\n");
        let store = MemoryStateStore::seeded_from(&state_store)?;
        let targets = if config.targets.is_empty() {
            vec![DeliveryTarget::new("console")]
        } else {
            config.targets.clone()
        };
        let policy = RetryPolicy {
            send_spacing: Duration::ZERO,
            ..config.retry.clone()
        };
        let dispatcher = Dispatcher::new(ConsoleTransport, targets, policy);
        let scheduler = Scheduler::new(feeds, source, dispatcher, store, config.scheduler.clone());
        return drive(scheduler, once);
    }

    let (token, targets) = config.delivery_credentials()?;
    let feeds = load_feeds(&service)?;
    if feeds.is_empty() {
        return Ok(());
    }

    let transport = TelegramTransport::new(token)?;
    println!("Connected as @{}", transport.identify()?);

    let dispatcher = Dispatcher::new(transport, targets.to_vec(), config.retry.clone());
    let scheduler = Scheduler::new(
        feeds,
        source,
        dispatcher,
        state_store,
        config.scheduler.clone(),
    );
    drive(scheduler, once)
}

fn load_feeds<S: FeedSource>(
    service: &FeedService<SqliteFeedRepository, S>,
) -> FeederResult<Vec<Feed>> {
    let feeds = service.list()?;
    if feeds.is_empty() {
        println!("No feeds configured.");
    }
    Ok(feeds)
}

/// One cycle for `check`, or the background loop plus console for `run`
fn drive<S, T, St>(mut scheduler: Scheduler<S, T, St>, once: bool) -> FeederResult<()>
where
    S: FeedSource + 'static,
    T: Transport + 'static,
    St: StateStore + 'static,
{
    if once {
        println!("Fetching feeds...\n");
        let report = scheduler.run_cycle()?;
        print_report(&report);
        return Ok(());
    }

    let handle = scheduler.handle();
    let worker = thread::spawn(move || scheduler.run());

    console(&handle)?;

    worker
        .join()
        .map_err(|_| FeederError::CycleAborted("scheduler thread panicked".to_string()))
}

/// Read commands from stdin until `quit`. End of input leaves the scheduler running.
fn console(handle: &SchedulerHandle) -> FeederResult<()> {
    println!("Scheduler running. Commands: status, feeds, check, quit");

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;

        match line.trim() {
            "" => continue,
            "status" => print_status(&handle.status()),
            "feeds" => {
                for (name, url) in handle.feed_list() {
                    println!("  {} - {}", name, url);
                }
            }
            "check" => match handle.force_cycle() {
                Ok(report) => print_report(&report),
                Err(e) => println!("Check failed: {}", e),
            },
            "quit" | "exit" => {
                println!("Stopping...");
                handle.shutdown();
                return Ok(());
            }
            other => println!("Unknown command: {}", other),
        }
        io::stdout().flush()?;
    }

    Ok(())
}

fn print_status(status: &SchedulerStatus) {
    println!("Last check: {}", status.last_check.format("%d/%m/%Y %H:%M:%S UTC"));
    println!("Processed links: {}", status.seen_count);
    println!("Feeds: {}", status.feed_count);
    println!("Interval: {}s", status.interval_seconds);
}

fn print_report(report: &CycleReport) {
    println!(
        "Polled {} feeds ({} failed): {} new, {} delivered, {} failed, {} skipped",
        report.feeds_polled,
        report.feeds_failed,
        report.entries_selected,
        report.entries_delivered,
        report.entries_failed,
        report.entries_skipped
    );
    if report.interrupted {
        println!("Cycle interrupted by shutdown.");
    }
}
