pub mod feed;
pub mod entry;
pub mod notification;
pub mod state;

pub use feed::{DeliveryTarget, Feed};
pub use entry::{NormalizedEntry, Published, RawEntry};
pub use notification::NotificationPayload;
pub use state::{PollState, SeenLinks};
