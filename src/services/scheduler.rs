//! The poll loop: owns the watermark and seen-link set and drives
//! fetch, filter, format, dispatch and persist for every feed, once per cycle.
//!
//! The loop runs on its own thread via [`Scheduler::run`]. Other threads talk to
//! it through a [`SchedulerHandle`], which reads published state under a lock and
//! sends commands (forced cycle, shutdown) over a channel that also serves as the
//! interruptible inter-cycle sleep.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::{Feed, NormalizedEntry, PollState, RawEntry, SeenLinks};
use crate::errors::{FeederError, FeederResult, FetchError};
use crate::services::dispatcher::Dispatcher;
use crate::services::formatter::MessageFormatter;
use crate::services::normalizer::normalize_entry;
use crate::services::novelty::{select_new, DEFAULT_BATCH_LIMIT};
use crate::sources::FeedSource;
use crate::storage::StateStore;
use crate::transport::Transport;

const MAX_COOLDOWN: Duration = Duration::from_secs(60 * 60);

/// When a link that could not be delivered anywhere enters the seen set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeenPolicy {
    /// Record once every target reached a final outcome, delivered or not
    #[default]
    AfterTerminal,
    /// Leave links that exhausted their retries unrecorded and hold the
    /// watermark below them so the next cycle selects them again, for at most
    /// [`SchedulerSettings::max_redelivery_cycles`] cycles in a row
    OnlyDelivered,
}

impl FromStr for SeenPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "terminal" | "after-terminal" => Ok(SeenPolicy::AfterTerminal),
            "delivered" | "only-delivered" => Ok(SeenPolicy::OnlyDelivered),
            _ => Err(format!("Unknown seen policy: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub interval: Duration,
    /// Pause after a cycle that failed as a whole
    pub cooldown: Duration,
    /// How far back the first run looks
    pub lookback: chrono::Duration,
    pub seen_capacity: usize,
    pub batch_limit: usize,
    pub seen_policy: SeenPolicy,
    /// Cycles a link may fail everywhere under [`SeenPolicy::OnlyDelivered`]
    /// before it is recorded as seen anyway
    pub max_redelivery_cycles: u32,
}

impl SchedulerSettings {
    pub fn cooldown_for(interval: Duration) -> Duration {
        interval.saturating_mul(5).min(MAX_COOLDOWN)
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        let interval = Duration::from_secs(300);
        Self {
            interval,
            cooldown: Self::cooldown_for(interval),
            lookback: chrono::Duration::hours(1),
            seen_capacity: 1000,
            batch_limit: DEFAULT_BATCH_LIMIT,
            seen_policy: SeenPolicy::default(),
            max_redelivery_cycles: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub last_check: DateTime<Utc>,
    pub seen_count: usize,
    pub feed_count: usize,
    pub interval_seconds: u64,
}

impl SchedulerStatus {
    /// The status a scheduler would report right after starting on `store`
    pub fn from_store<St: StateStore>(
        store: &St,
        feed_count: usize,
        settings: &SchedulerSettings,
    ) -> Self {
        let state = load_state(store, settings);
        Self {
            last_check: state.last_check,
            seen_count: state.seen.len(),
            feed_count,
            interval_seconds: settings.interval.as_secs(),
        }
    }
}

/// What one poll cycle did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub feeds_polled: usize,
    pub feeds_failed: usize,
    pub entries_selected: usize,
    pub entries_delivered: usize,
    pub entries_failed: usize,
    pub entries_skipped: usize,
    /// Shutdown arrived before every feed was handled
    pub interrupted: bool,
    pub watermark: DateTime<Utc>,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>, watermark: DateTime<Utc>) -> Self {
        Self {
            started_at,
            feeds_polled: 0,
            feeds_failed: 0,
            entries_selected: 0,
            entries_delivered: 0,
            entries_failed: 0,
            entries_skipped: 0,
            interrupted: false,
            watermark,
        }
    }
}

enum Command {
    ForceCycle(Sender<FeederResult<CycleReport>>),
    Shutdown,
}

/// Cloneable, thread-safe view of a running scheduler
#[derive(Clone)]
pub struct SchedulerHandle {
    state: Arc<RwLock<PollState>>,
    feeds: Arc<Vec<Feed>>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    commands: Sender<Command>,
}

impl SchedulerHandle {
    pub fn status(&self) -> SchedulerStatus {
        let state = self.state.read().unwrap_or_else(|p| p.into_inner());
        SchedulerStatus {
            last_check: state.last_check,
            seen_count: state.seen.len(),
            feed_count: self.feeds.len(),
            interval_seconds: self.interval.as_secs(),
        }
    }

    /// Configured feeds as (name, url), in polling order
    pub fn feed_list(&self) -> Vec<(String, String)> {
        self.feeds
            .iter()
            .map(|f| (f.name.clone(), f.url.clone()))
            .collect()
    }

    pub fn snapshot(&self) -> PollState {
        self.state.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Run one cycle now and wait for its report. Only valid while [`Scheduler::run`]
    /// is executing on another thread.
    pub fn force_cycle(&self) -> FeederResult<CycleReport> {
        let (reply, response) = mpsc::channel();
        self.commands
            .send(Command::ForceCycle(reply))
            .map_err(|_| FeederError::SchedulerStopped)?;
        response.recv().map_err(|_| FeederError::SchedulerStopped)?
    }

    /// Ask the loop to stop. Sleeps end at once; an in-flight send finishes first.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.commands.send(Command::Shutdown);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

pub struct Scheduler<S: FeedSource, T: Transport, St: StateStore> {
    feeds: Arc<Vec<Feed>>,
    source: S,
    dispatcher: Dispatcher<T>,
    formatter: MessageFormatter,
    store: St,
    settings: SchedulerSettings,
    state: Arc<RwLock<PollState>>,
    shutdown: Arc<AtomicBool>,
    commands: Receiver<Command>,
    sender: Sender<Command>,
}

impl<S: FeedSource, T: Transport, St: StateStore> Scheduler<S, T, St> {
    /// Build a scheduler, loading persisted state or falling back to a first-run state
    pub fn new(
        feeds: Vec<Feed>,
        source: S,
        dispatcher: Dispatcher<T>,
        store: St,
        settings: SchedulerSettings,
    ) -> Self {
        if dispatcher.targets().is_empty() {
            warn!("no delivery targets configured, entries will be recorded without delivery");
        }

        let state = load_state(&store, &settings);
        info!(
            last_check = %state.last_check,
            seen = state.seen.len(),
            feeds = feeds.len(),
            "scheduler state loaded"
        );

        let (sender, commands) = mpsc::channel();

        Self {
            feeds: Arc::new(feeds),
            source,
            dispatcher,
            formatter: MessageFormatter::default(),
            store,
            settings,
            state: Arc::new(RwLock::new(state)),
            shutdown: Arc::new(AtomicBool::new(false)),
            commands,
            sender,
        }
    }

    pub fn with_formatter(mut self, formatter: MessageFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            state: Arc::clone(&self.state),
            feeds: Arc::clone(&self.feeds),
            interval: self.settings.interval,
            shutdown: Arc::clone(&self.shutdown),
            commands: self.sender.clone(),
        }
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, PollState> {
        self.state.read().unwrap_or_else(|p| p.into_inner())
    }

    /// Poll until shutdown. Cycle failures and panics are logged and followed by a cooldown.
    pub fn run(mut self) {
        info!(
            feeds = self.feeds.len(),
            interval_secs = self.settings.interval.as_secs(),
            "scheduler started"
        );

        while !self.is_shutdown() {
            let pause = match self.guarded_cycle() {
                Ok(_) => self.settings.interval,
                Err(e) => {
                    error!(error = %e, cooldown_secs = self.settings.cooldown.as_secs(), "poll cycle failed");
                    self.settings.cooldown
                }
            };

            if !self.wait(pause) {
                break;
            }
        }

        info!("scheduler stopped");
    }

    /// Sleep for `duration`, serving forced cycles meanwhile. False means stop.
    fn wait(&mut self, duration: Duration) -> bool {
        let now = Instant::now();
        let deadline = now
            .checked_add(duration)
            .unwrap_or_else(|| now + MAX_COOLDOWN);

        loop {
            if self.is_shutdown() {
                return false;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return true;
            }

            match self.commands.recv_timeout(remaining) {
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => return false,
                Ok(Command::ForceCycle(reply)) => {
                    debug!("forced poll cycle");
                    let result = self.guarded_cycle();
                    let _ = reply.send(result);
                }
                Err(RecvTimeoutError::Timeout) => return true,
            }
        }
    }

    /// One cycle with panics turned into errors
    fn guarded_cycle(&mut self) -> FeederResult<CycleReport> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle())) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(FeederError::CycleAborted(message))
            }
        }
    }

    /// Run one full pass over every feed and persist the resulting state.
    ///
    /// Returns an error only when persisting fails; the in-memory state has
    /// already been updated by then, so nothing delivered is selected again.
    pub fn run_cycle(&mut self) -> FeederResult<CycleReport> {
        let started_at = Utc::now();
        let (watermark, mut progress) = {
            let state = self.read_state();
            (state.last_check, CycleProgress::new(&state))
        };

        let mut report = CycleReport::new(started_at, watermark);

        if self.is_shutdown() {
            report.interrupted = true;
        } else {
            info!(feeds = self.feeds.len(), %watermark, "poll cycle started");
            let fetched = self.fetch_all();

            for (feed, result) in self.feeds.iter().zip(fetched) {
                if self.is_shutdown() {
                    report.interrupted = true;
                    break;
                }

                report.feeds_polled += 1;
                let entries = match result {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!(feed = %feed.name, url = %feed.url, error = %e, "feed fetch failed");
                        report.feeds_failed += 1;
                        continue;
                    }
                };

                if !self.process_feed(feed, entries, watermark, &mut progress, &mut report) {
                    report.interrupted = true;
                    break;
                }
            }
        }

        // An interrupted cycle left feeds unread; keep the watermark where it was
        let hold = progress.hold;
        let mut next = progress.into_state(watermark, report.interrupted);
        if !report.interrupted {
            next.advance_watermark(hold.map_or(started_at, |h| h.min(started_at)));
        }
        report.watermark = next.last_check;
        let links = next.seen.to_vec();

        *self.state.write().unwrap_or_else(|p| p.into_inner()) = next;

        self.store.save_state(report.watermark, &links).map_err(|e| {
            error!(error = %e, "failed to persist poll state, keeping it in memory");
            FeederError::from(e)
        })?;

        info!(
            polled = report.feeds_polled,
            failed_feeds = report.feeds_failed,
            selected = report.entries_selected,
            delivered = report.entries_delivered,
            failed = report.entries_failed,
            skipped = report.entries_skipped,
            watermark = %report.watermark,
            interrupted = report.interrupted,
            "poll cycle finished"
        );

        Ok(report)
    }

    /// Fetch every feed concurrently, one scoped thread per feed; results keep feed order
    fn fetch_all(&self) -> Vec<Result<Vec<RawEntry>, FetchError>> {
        let source = &self.source;

        thread::scope(|scope| {
            let workers: Vec<_> = self
                .feeds
                .iter()
                .map(|feed| scope.spawn(move || source.fetch(&feed.url)))
                .collect();

            workers
                .into_iter()
                .map(|worker| worker.join().unwrap_or(Err(FetchError::WorkerPanicked)))
                .collect()
        })
    }

    /// Filter, format and dispatch one feed's entries. False if shutdown cut it short.
    fn process_feed(
        &self,
        feed: &Feed,
        entries: Vec<RawEntry>,
        watermark: DateTime<Utc>,
        progress: &mut CycleProgress,
        report: &mut CycleReport,
    ) -> bool {
        let normalized: Vec<NormalizedEntry> =
            entries.into_iter().filter_map(normalize_entry).collect();
        let selected = select_new(
            &normalized,
            watermark,
            &progress.seen,
            self.settings.batch_limit,
        );

        debug!(
            feed = %feed.name,
            fetched = normalized.len(),
            selected = selected.len(),
            "entries filtered"
        );
        report.entries_selected += selected.len();

        for entry in selected {
            if self.is_shutdown() {
                return false;
            }

            let payload = match self.formatter.format(entry, &feed.name) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(feed = %feed.name, link = %entry.link, error = %e, "dropping entry");
                    report.entries_skipped += 1;
                    continue;
                }
            };

            let delivery = self.dispatcher.deliver(&payload);
            if delivery.any_delivered() {
                report.entries_delivered += 1;
                progress.record(&entry.link);
                continue;
            }

            report.entries_failed += 1;
            let retry_later = self.settings.seen_policy == SeenPolicy::OnlyDelivered
                && delivery.undelivered_after_retries();

            if !retry_later {
                progress.record(&entry.link);
                continue;
            }

            let attempts = progress.count_failure(&entry.link);
            if attempts >= self.settings.max_redelivery_cycles {
                warn!(
                    feed = %feed.name,
                    link = %entry.link,
                    attempts,
                    "giving up on entry after repeated delivery failures"
                );
                progress.record(&entry.link);
            } else if let Some(published) = entry.published.instant() {
                // Unparsable dates stay eligible regardless of the watermark
                let below = published - chrono::Duration::nanoseconds(1);
                progress.hold = Some(progress.hold.map_or(below, |h| h.min(below)));
            }
        }

        true
    }
}

/// What a cycle changes before it is committed to [`PollState`]
struct CycleProgress {
    seen: SeenLinks,
    /// Lowest instant the watermark may advance to this cycle
    hold: Option<DateTime<Utc>>,
    /// Failure counts from earlier cycles
    carried_failures: HashMap<String, u32>,
    /// Failure counts for links that failed again this cycle
    failures: HashMap<String, u32>,
}

impl CycleProgress {
    fn new(state: &PollState) -> Self {
        Self {
            seen: state.seen.clone(),
            hold: None,
            carried_failures: state.failed_attempts.clone(),
            failures: HashMap::new(),
        }
    }

    fn record(&mut self, link: &str) {
        self.seen.insert(link.to_string());
        self.carried_failures.remove(link);
        self.failures.remove(link);
    }

    /// Bump and return the number of consecutive cycles `link` failed everywhere
    fn count_failure(&mut self, link: &str) -> u32 {
        let attempts = self.carried_failures.remove(link).unwrap_or(0) + 1;
        self.failures.insert(link.to_string(), attempts);
        attempts
    }

    /// A full cycle drops counts for links it did not retry; an interrupted one keeps them
    fn into_state(self, watermark: DateTime<Utc>, interrupted: bool) -> PollState {
        let mut failed_attempts = self.failures;
        if interrupted {
            for (link, attempts) in self.carried_failures {
                failed_attempts.entry(link).or_insert(attempts);
            }
        }

        PollState {
            last_check: watermark,
            seen: self.seen,
            failed_attempts,
        }
    }
}

fn load_state<St: StateStore>(store: &St, settings: &SchedulerSettings) -> PollState {
    let mut state = PollState::initial(Utc::now(), settings.lookback, settings.seen_capacity);

    match store.load_watermark() {
        Ok(Some(last_check)) => state.last_check = last_check,
        Ok(None) => debug!("no persisted watermark, starting from lookback window"),
        Err(e) => warn!(error = %e, "could not load watermark, starting from lookback window"),
    }

    match store.load_seen_links() {
        Ok(links) => state.seen = SeenLinks::from_links(links, settings.seen_capacity),
        Err(e) => warn!(error = %e, "could not load seen links, starting empty"),
    }

    state
}
