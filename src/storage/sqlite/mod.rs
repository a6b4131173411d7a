mod connection;
mod feed_repository;
mod state_store;

pub use connection::SqliteStorage;
pub use feed_repository::SqliteFeedRepository;
pub use state_store::SqliteStateStore;
