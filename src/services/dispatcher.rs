use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::domain::{DeliveryTarget, NotificationPayload};
use crate::errors::DeliveryError;
use crate::transport::Transport;

/// Blocking pause, injectable so tests can observe backoff without waiting.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt, per target
    pub max_retries: u32,
    /// Delay before retrying a generic failure
    pub retry_delay: Duration,
    /// Minimum delay before retrying a rate-limited send
    pub rate_limit_backoff: Duration,
    /// Minimum gap between consecutive sends, across targets and payloads
    pub send_spacing: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            rate_limit_backoff: Duration::from_secs(60),
            send_spacing: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    fn backoff_for(&self, error: &DeliveryError) -> Duration {
        match error {
            DeliveryError::RateLimited { retry_after } => {
                (*retry_after).unwrap_or_default().max(self.rate_limit_backoff)
            }
            _ => self.retry_delay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Delivered { attempts: u32 },
    Failed { attempts: u32, error: DeliveryError },
}

impl TargetOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, TargetOutcome::Delivered { .. })
    }
}

/// Per-target results for one payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub outcomes: Vec<(DeliveryTarget, TargetOutcome)>,
}

impl DeliveryReport {
    pub fn any_delivered(&self) -> bool {
        self.outcomes.iter().any(|(_, o)| o.is_delivered())
    }

    pub fn delivered_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_delivered()).count()
    }

    /// Nothing delivered and at least one target gave up on a retryable error
    pub fn undelivered_after_retries(&self) -> bool {
        !self.any_delivered()
            && self.outcomes.iter().any(|(_, o)| {
                matches!(o, TargetOutcome::Failed { error, .. } if error.is_retryable())
            })
    }
}

pub struct Dispatcher<T: Transport> {
    transport: T,
    targets: Vec<DeliveryTarget>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    last_send: Mutex<Option<Instant>>,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: T, targets: Vec<DeliveryTarget>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            targets,
            policy,
            sleeper: Arc::new(ThreadSleeper),
            last_send: Mutex::new(None),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn targets(&self) -> &[DeliveryTarget] {
        &self.targets
    }

    /// Send `payload` to every target in order, one target at a time
    pub fn deliver(&self, payload: &NotificationPayload) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for target in &self.targets {
            let outcome = self.deliver_to(target, payload);
            match &outcome {
                TargetOutcome::Delivered { attempts } => {
                    info!(chat = %target, link = %payload.source_link, attempts, "delivered");
                }
                TargetOutcome::Failed { attempts, error } => {
                    warn!(
                        chat = %target,
                        link = %payload.source_link,
                        attempts,
                        error = %error,
                        "delivery failed"
                    );
                }
            }
            report.outcomes.push((target.clone(), outcome));
        }

        report
    }

    fn deliver_to(&self, target: &DeliveryTarget, payload: &NotificationPayload) -> TargetOutcome {
        let mut attempts = 0;

        loop {
            self.pace();
            attempts += 1;
            let result = self.transport.send(target, payload);
            self.mark_sent();

            let error = match result {
                Ok(()) => return TargetOutcome::Delivered { attempts },
                Err(error) => error,
            };

            if !error.is_retryable() || attempts > self.policy.max_retries {
                return TargetOutcome::Failed { attempts, error };
            }

            let delay = self.policy.backoff_for(&error);
            debug!(chat = %target, attempts, error = %error, ?delay, "retrying send");
            self.sleeper.sleep(delay);
        }
    }

    /// Hold off until `send_spacing` has passed since the previous send
    fn pace(&self) {
        if self.policy.send_spacing.is_zero() {
            return;
        }

        let last = *self.last_send.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(last) = last {
            let elapsed = last.elapsed();
            if elapsed < self.policy.send_spacing {
                self.sleeper.sleep(self.policy.send_spacing - elapsed);
            }
        }
    }

    fn mark_sent(&self) {
        *self.last_send.lock().unwrap_or_else(|p| p.into_inner()) = Some(Instant::now());
    }
}
