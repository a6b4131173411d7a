use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::errors::PersistenceError;
use crate::storage::traits::StateStore;

#[derive(Debug, Default, Clone)]
struct Snapshot {
    watermark: Option<DateTime<Utc>>,
    links: Vec<String>,
}

/// Process-local state store. Dry runs seed it from the real store so nothing is written back.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    snapshot: Mutex<Snapshot>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the current contents of another store
    pub fn seeded_from(store: &dyn StateStore) -> Result<Self, PersistenceError> {
        Ok(Self {
            snapshot: Mutex::new(Snapshot {
                watermark: store.load_watermark()?,
                links: store.load_seen_links()?,
            }),
        })
    }
}

impl StateStore for MemoryStateStore {
    fn load_watermark(&self) -> Result<Option<DateTime<Utc>>, PersistenceError> {
        Ok(self.snapshot.lock().unwrap_or_else(|p| p.into_inner()).watermark)
    }

    fn load_seen_links(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self
            .snapshot
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .links
            .clone())
    }

    fn save_state(&self, watermark: DateTime<Utc>, links: &[String]) -> Result<(), PersistenceError> {
        // One lock covers both fields
        *self.snapshot.lock().unwrap_or_else(|p| p.into_inner()) = Snapshot {
            watermark: Some(watermark),
            links: links.to_vec(),
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::{SqliteStateStore, SqliteStorage};

    #[test]
    fn test_starts_empty() {
        let store = MemoryStateStore::new();
        assert!(store.load_watermark().unwrap().is_none());
        assert!(store.load_seen_links().unwrap().is_empty());
    }

    #[test]
    fn test_seeded_copy_is_independent() {
        let sqlite = SqliteStateStore::new(SqliteStorage::in_memory().unwrap());
        let watermark = Utc::now();
        sqlite.save_state(watermark, &["https://a".to_string()]).unwrap();

        let memory = MemoryStateStore::seeded_from(&sqlite).unwrap();
        assert_eq!(memory.load_watermark().unwrap(), Some(watermark));

        memory
            .save_state(Utc::now(), &["https://a".to_string(), "https://b".to_string()])
            .unwrap();
        assert_eq!(memory.load_seen_links().unwrap().len(), 2);
        assert_eq!(sqlite.load_seen_links().unwrap().len(), 1);
    }
}
