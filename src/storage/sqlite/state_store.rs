use chrono::{DateTime, Utc};

use crate::errors::PersistenceError;
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::StateStore;

pub struct SqliteStateStore {
    storage: SqliteStorage,
}

impl SqliteStateStore {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }
}

impl StateStore for SqliteStateStore {
    fn load_watermark(&self) -> Result<Option<DateTime<Utc>>, PersistenceError> {
        let conn = self.storage.connection()?;
        let raw = conn.query_row("SELECT last_check FROM poll_state WHERE id = 1", [], |row| {
            row.get::<_, String>(0)
        });

        match raw {
            Ok(raw) => DateTime::parse_from_rfc3339(&raw)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| PersistenceError::Corrupt(format!("last_check {:?}: {}", raw, e))),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn load_seen_links(&self) -> Result<Vec<String>, PersistenceError> {
        let conn = self.storage.connection()?;
        let mut stmt = conn.prepare("SELECT link FROM seen_links ORDER BY position ASC")?;
        let links = stmt.query_map([], |row| row.get(0))?;

        Ok(links.collect::<Result<Vec<String>, _>>()?)
    }

    fn save_state(&self, watermark: DateTime<Utc>, links: &[String]) -> Result<(), PersistenceError> {
        let mut conn = self.storage.connection()?;
        // Dropping the transaction without commit rolls back
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO poll_state (id, last_check, updated_at) VALUES (1, ?1, datetime('now'))
             ON CONFLICT(id) DO UPDATE SET last_check = excluded.last_check, updated_at = excluded.updated_at",
            [watermark.to_rfc3339()],
        )?;

        tx.execute("DELETE FROM seen_links", [])?;
        {
            let mut insert = tx.prepare("INSERT INTO seen_links (position, link) VALUES (?1, ?2)")?;
            for (position, link) in links.iter().enumerate() {
                insert.execute((position as i64, link))?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}
