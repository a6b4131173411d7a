use std::str::FromStr;
use std::time::Duration;

use crate::domain::DeliveryTarget;
use crate::errors::{FeederError, FeederResult};
use crate::services::{RetryPolicy, SchedulerSettings, SeenPolicy};
use crate::sources::rss_atom::DEFAULT_FETCH_LIMIT;

/// One week
const MAX_CHECK_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;
/// Ten years
const MAX_LOOKBACK_MINUTES: i64 = 10 * 365 * 24 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: Option<String>,
    pub targets: Vec<DeliveryTarget>,
    pub db_path: String,
    pub fetch_limit: usize,
    pub retry: RetryPolicy,
    pub scheduler: SchedulerSettings,
}

impl Config {
    /// Get the directory where the executable is located
    fn exe_dir() -> Option<std::path::PathBuf> {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    pub fn from_env() -> FeederResult<Self> {
        let exe_dir = Self::exe_dir();

        // Try to load .env from executable's directory first
        if let Some(ref dir) = exe_dir {
            let env_path = dir.join(".env");
            if env_path.exists() {
                dotenvy::from_path(&env_path).ok();
            }
        }
        // Fall back to current directory
        dotenvy::dotenv().ok();

        // Default db_path is relative to executable directory
        let default_db = exe_dir
            .map(|d| d.join("feedbot.db").to_string_lossy().into_owned())
            .unwrap_or_else(|| "./feedbot.db".to_string());

        Self::from_lookup(|key| std::env::var(key).ok(), &default_db)
    }

    /// Build from an arbitrary variable source; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F, default_db: &str) -> FeederResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let retry_defaults = RetryPolicy::default();
        let scheduler_defaults = SchedulerSettings::default();

        let retry = RetryPolicy {
            max_retries: parse_var(&get, "FEEDER_MAX_RETRIES", retry_defaults.max_retries)?,
            retry_delay: parse_secs(&get, "FEEDER_RETRY_DELAY_SECS", retry_defaults.retry_delay)?,
            rate_limit_backoff: parse_secs(
                &get,
                "FEEDER_RATE_LIMIT_BACKOFF_SECS",
                retry_defaults.rate_limit_backoff,
            )?,
            send_spacing: parse_secs(&get, "FEEDER_SEND_SPACING_SECS", retry_defaults.send_spacing)?,
        };

        let interval = parse_secs(&get, "FEEDER_CHECK_INTERVAL_SECS", scheduler_defaults.interval)?;
        if interval.is_zero() || interval.as_secs() > MAX_CHECK_INTERVAL_SECS {
            return Err(FeederError::Config(format!(
                "FEEDER_CHECK_INTERVAL_SECS must be between 1 and {}",
                MAX_CHECK_INTERVAL_SECS
            )));
        }

        let lookback_minutes: i64 = parse_var(
            &get,
            "FEEDER_LOOKBACK_MINUTES",
            scheduler_defaults.lookback.num_minutes(),
        )?;
        if lookback_minutes > MAX_LOOKBACK_MINUTES {
            return Err(FeederError::Config(format!(
                "FEEDER_LOOKBACK_MINUTES must be at most {}",
                MAX_LOOKBACK_MINUTES
            )));
        }

        let scheduler = SchedulerSettings {
            interval,
            cooldown: SchedulerSettings::cooldown_for(interval),
            lookback: chrono::Duration::minutes(lookback_minutes.max(0)),
            seen_capacity: parse_var(&get, "FEEDER_SEEN_CAPACITY", scheduler_defaults.seen_capacity)?,
            batch_limit: parse_var(&get, "FEEDER_BATCH_LIMIT", scheduler_defaults.batch_limit)?,
            seen_policy: parse_var(&get, "FEEDER_SEEN_POLICY", scheduler_defaults.seen_policy)?,
            max_redelivery_cycles: parse_var(
                &get,
                "FEEDER_MAX_REDELIVERY_CYCLES",
                scheduler_defaults.max_redelivery_cycles,
            )?
            .max(1),
        };

        Ok(Self {
            telegram_token: get("TELEGRAM_BOT_TOKEN"),
            targets: get("TELEGRAM_TARGETS")
                .map(|v| DeliveryTarget::parse_list(&v))
                .unwrap_or_default(),
            db_path: get("FEEDER_DB_PATH").unwrap_or_else(|| default_db.to_string()),
            fetch_limit: parse_var(&get, "FEEDER_FETCH_LIMIT", DEFAULT_FETCH_LIMIT)?,
            retry,
            scheduler,
        })
    }

    /// Token and targets, required for any run that actually delivers
    pub fn delivery_credentials(&self) -> FeederResult<(&str, &[DeliveryTarget])> {
        let token = self
            .telegram_token
            .as_deref()
            .ok_or_else(|| FeederError::MissingEnvVar("TELEGRAM_BOT_TOKEN".to_string()))?;

        if self.targets.is_empty() {
            return Err(FeederError::MissingEnvVar("TELEGRAM_TARGETS".to_string()));
        }

        Ok((token, &self.targets))
    }
}

fn parse_var<G, T>(get: &G, key: &str, default: T) -> FeederResult<T>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| FeederError::Config(format!("{}={:?}: {}", key, value, e))),
        None => Ok(default),
    }
}

fn parse_secs<G>(get: &G, key: &str, default: Duration) -> FeederResult<Duration>
where
    G: Fn(&str) -> Option<String>,
{
    parse_var(get, key, default.as_secs()).map(Duration::from_secs)
}
