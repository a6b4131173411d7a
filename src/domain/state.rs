use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};

/// Bounded, insertion-ordered set of delivered links. Oldest evicted first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenLinks {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
}

impl SeenLinks {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Rebuild from a persisted oldest-first list; overflow keeps the newest
    pub fn from_links<I>(links: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = Self::with_capacity(capacity);
        for link in links {
            seen.insert(link);
        }
        seen
    }

    pub fn contains(&self, link: &str) -> bool {
        self.members.contains(link)
    }

    /// Returns false if the link was already present
    pub fn insert(&mut self, link: String) -> bool {
        if self.members.contains(&link) {
            return false;
        }

        self.members.insert(link.clone());
        self.order.push_back(link);

        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }

        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }
}

/// Watermark plus seen set: everything the scheduler persists between cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    /// Entries published at or before this instant were already considered
    pub last_check: DateTime<Utc>,
    pub seen: SeenLinks,
    /// Consecutive cycles each link ran out of retries on every target.
    /// Process-local; a restart starts the count over.
    pub failed_attempts: HashMap<String, u32>,
}

impl PollState {
    /// First-run state: watermark one lookback window in the past, nothing seen
    pub fn initial(now: DateTime<Utc>, lookback: Duration, capacity: usize) -> Self {
        Self {
            last_check: now - lookback,
            seen: SeenLinks::with_capacity(capacity),
            failed_attempts: HashMap::new(),
        }
    }

    /// Move the watermark forward; never backward
    pub fn advance_watermark(&mut self, to: DateTime<Utc>) {
        if to > self.last_check {
            self.last_check = to;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_reports_duplicates() {
        let mut seen = SeenLinks::with_capacity(3);
        assert!(seen.insert("a".to_string()));
        assert!(!seen.insert("a".to_string()));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_never_exceeds_capacity_and_evicts_oldest() {
        let mut seen = SeenLinks::with_capacity(3);
        for i in 0..10 {
            seen.insert(format!("link-{}", i));
            assert!(seen.len() <= 3);
        }

        assert_eq!(seen.to_vec(), vec!["link-7", "link-8", "link-9"]);
        assert!(!seen.contains("link-6"));
        assert!(seen.contains("link-9"));
    }

    #[test]
    fn test_from_links_keeps_newest_on_overflow() {
        let links = (0..5).map(|i| format!("l{}", i));
        let seen = SeenLinks::from_links(links, 2);
        assert_eq!(seen.to_vec(), vec!["l3", "l4"]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut seen = SeenLinks::with_capacity(0);
        seen.insert("a".to_string());
        assert_eq!(seen.capacity(), 1);
        assert!(seen.contains("a"));
    }

    #[test]
    fn test_watermark_never_moves_backward() {
        let now = Utc::now();
        let mut state = PollState::initial(now, Duration::hours(1), 10);
        assert_eq!(state.last_check, now - Duration::hours(1));

        state.advance_watermark(now);
        assert_eq!(state.last_check, now);

        state.advance_watermark(now - Duration::minutes(5));
        assert_eq!(state.last_check, now);
    }
}
