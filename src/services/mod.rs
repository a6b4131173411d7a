pub mod dispatcher;
pub mod feed_service;
pub mod formatter;
pub mod normalizer;
pub mod novelty;
pub mod scheduler;

pub use dispatcher::{DeliveryReport, Dispatcher, RetryPolicy, Sleeper, TargetOutcome, ThreadSleeper};
pub use feed_service::FeedService;
pub use formatter::MessageFormatter;
pub use scheduler::{
    CycleReport, Scheduler, SchedulerHandle, SchedulerSettings, SchedulerStatus, SeenPolicy,
};
