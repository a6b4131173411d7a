pub mod traits;
pub mod sqlite;
pub mod memory;

pub use traits::{FeedRepository, StateStore};
pub use sqlite::{SqliteFeedRepository, SqliteStateStore, SqliteStorage};
pub use memory::MemoryStateStore;
