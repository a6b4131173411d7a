use rusqlite::Row;

use crate::domain::Feed;
use crate::errors::{FeederError, FeederResult};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::FeedRepository;

const FEED_COLUMNS: &str = "id, name, url, created_at";

pub struct SqliteFeedRepository {
    storage: SqliteStorage,
}

impl SqliteFeedRepository {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }

    fn feed_from_row(row: &Row<'_>) -> rusqlite::Result<Feed> {
        Ok(Feed {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            url: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl FeedRepository for SqliteFeedRepository {
    fn add(&self, feed: &Feed) -> FeederResult<i64> {
        let conn = self.storage.connection()?;

        // Check within the same lock to avoid a race with a concurrent add
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM feeds WHERE name = ?1 OR url = ?2)",
            (&feed.name, &feed.url),
            |row| row.get(0),
        )?;

        if exists {
            return Err(FeederError::FeedAlreadyExists(feed.name.clone()));
        }

        conn.execute(
            "INSERT INTO feeds (name, url) VALUES (?1, ?2)",
            (&feed.name, &feed.url),
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn remove(&self, id: i64) -> FeederResult<()> {
        let conn = self.storage.connection()?;
        let removed = conn.execute("DELETE FROM feeds WHERE id = ?1", [id])?;
        if removed == 0 {
            return Err(FeederError::FeedNotFound(id.to_string()));
        }
        Ok(())
    }

    fn get_all(&self) -> FeederResult<Vec<Feed>> {
        let conn = self.storage.connection()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM feeds ORDER BY id ASC", FEED_COLUMNS))?;

        let feeds = stmt.query_map([], Self::feed_from_row)?;

        feeds.collect::<Result<Vec<_>, _>>().map_err(FeederError::from)
    }

    fn get_by_name(&self, name: &str) -> FeederResult<Option<Feed>> {
        let conn = self.storage.connection()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM feeds WHERE name = ?1", FEED_COLUMNS))?;

        match stmt.query_row([name], Self::feed_from_row) {
            Ok(f) => Ok(Some(f)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(FeederError::from(e)),
        }
    }

    fn exists(&self, name: &str, url: &str) -> FeederResult<bool> {
        let conn = self.storage.connection()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM feeds WHERE name = ?1 OR url = ?2)",
            (name, url),
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_repo() -> SqliteFeedRepository {
        let storage = SqliteStorage::in_memory().unwrap();
        SqliteFeedRepository::new(storage)
    }

    fn feed(name: &str, url: &str) -> Feed {
        Feed::new(name.to_string(), url.to_string())
    }

    #[test]
    fn test_add_and_get_feed() {
        let repo = setup_repo();

        let id = repo.add(&feed("PMA Brazilo", "https://pma.brazilo.org/na-rede/feed")).unwrap();
        assert!(id > 0);

        let retrieved = repo.get_by_name("PMA Brazilo").unwrap().unwrap();
        assert_eq!(retrieved.id, Some(id));
        assert_eq!(retrieved.url, "https://pma.brazilo.org/na-rede/feed");
        assert!(retrieved.created_at.is_some());
    }

    #[test]
    fn test_duplicate_name_or_url_rejected() {
        let repo = setup_repo();
        repo.add(&feed("Blog", "https://example.com/feed")).unwrap();

        let same_name = repo.add(&feed("Blog", "https://other.example.com/feed"));
        assert!(matches!(same_name, Err(FeederError::FeedAlreadyExists(_))));

        let same_url = repo.add(&feed("Other", "https://example.com/feed"));
        assert!(matches!(same_url, Err(FeederError::FeedAlreadyExists(_))));
    }

    #[test]
    fn test_remove_feed() {
        let repo = setup_repo();
        let id = repo.add(&feed("Blog", "https://example.com/feed")).unwrap();

        repo.remove(id).unwrap();
        assert!(repo.get_by_name("Blog").unwrap().is_none());
        assert!(matches!(repo.remove(id), Err(FeederError::FeedNotFound(_))));
    }

    #[test]
    fn test_get_all_in_insertion_order() {
        let repo = setup_repo();
        for name in ["Zeta", "Alpha", "Mid"] {
            repo.add(&feed(name, &format!("https://{}.example.com/feed", name.to_lowercase())))
                .unwrap();
        }

        let names: Vec<String> = repo.get_all().unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_exists() {
        let repo = setup_repo();

        assert!(!repo.exists("Blog", "https://example.com/feed").unwrap());
        repo.add(&feed("Blog", "https://example.com/feed")).unwrap();
        assert!(repo.exists("Blog", "https://elsewhere.example/feed").unwrap());
        assert!(repo.exists("Other", "https://example.com/feed").unwrap());
    }
}
