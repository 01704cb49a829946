//! ============================================================================
//! History Store - Append-only log of chat exchanges
//! ============================================================================
//! Appends never fail the caller; lookups degrade to `None` on error.
//! ============================================================================

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::HistoryConfig;
use crate::store::CareStore;
use crate::types::ChatEntry;

/// Chat history for identified users
pub struct HistoryStore {
    store: Arc<dyn CareStore>,
    window_days: i64,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn CareStore>, config: &HistoryConfig) -> Self {
        Self {
            store,
            window_days: config.window_days,
        }
    }

    /// Record one exchange. Errors are logged and dropped.
    pub async fn append(&self, user_id: Uuid, input: &str, response: &str) {
        let entry = ChatEntry::new(user_id, input.to_string(), response.to_string());

        match self.store.append_entry(&entry).await {
            Ok(()) => debug!("Appended chat entry {}", entry.id),
            Err(e) => warn!("Error storing chat history: {}", e),
        }
    }

    /// Oldest timestamp (inclusive) inside the window ending at `now`.
    /// A window reaching past chrono's range covers all history.
    pub fn window_start(&self, now: DateTime<Utc>) -> i64 {
        Duration::try_days(self.window_days)
            .and_then(|window| now.checked_sub_signed(window))
            .map(|start| start.timestamp())
            .unwrap_or(i64::MIN)
    }

    /// Most recent entry for `user_id` inside the history window
    pub async fn last_within_window(&self, user_id: Uuid) -> Option<ChatEntry> {
        let since = self.window_start(Utc::now());

        match self.store.latest_entry_since(user_id, since).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error retrieving chat history: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn days_ago(days: i64) -> i64 {
        (Utc::now() - Duration::days(days)).timestamp()
    }

    fn history() -> (Arc<MemoryStore>, HistoryStore) {
        let store = Arc::new(MemoryStore::default());
        (store.clone(), HistoryStore::new(store, &HistoryConfig::default()))
    }

    #[tokio::test]
    async fn test_append_then_fetch() {
        let (store, history) = history();
        let user_id = Uuid::new_v4();

        history.append(user_id, "I feel stressed", "That sounds hard").await;

        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].bot_response, "That sounds hard");

        let last = history.last_within_window(user_id).await.unwrap();
        assert_eq!(last.user_input, "I feel stressed");
    }

    #[tokio::test]
    async fn test_picks_newest_inside_window() {
        let (store, history) = history();
        let user_id = Uuid::new_v4();

        for (input, age) in [("exam soon", 40), ("lonely", 10), ("sad", 20)] {
            store
                .append_entry(&ChatEntry::at(user_id, input.into(), String::new(), days_ago(age)))
                .await
                .unwrap();
        }

        let last = history.last_within_window(user_id).await.unwrap();
        assert_eq!(last.user_input, "lonely");
    }

    #[tokio::test]
    async fn test_entries_outside_window_ignored() {
        let (store, history) = history();
        let user_id = Uuid::new_v4();
        store
            .append_entry(&ChatEntry::at(user_id, "exam".into(), String::new(), days_ago(31)))
            .await
            .unwrap();

        assert!(history.last_within_window(user_id).await.is_none());
    }

    #[tokio::test]
    async fn test_window_boundary_is_inclusive() {
        let (store, history) = history();
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let start = history.window_start(now);
        assert_eq!(start, (now - Duration::days(30)).timestamp());

        store
            .append_entry(&ChatEntry::at(user_id, "outside".into(), String::new(), start - 1))
            .await
            .unwrap();
        assert!(store.latest_entry_since(user_id, start).await.unwrap().is_none());

        store
            .append_entry(&ChatEntry::at(user_id, "on the edge".into(), String::new(), start))
            .await
            .unwrap();
        let last = store.latest_entry_since(user_id, start).await.unwrap().unwrap();
        assert_eq!(last.user_input, "on the edge");
    }

    #[tokio::test]
    async fn test_edges_of_default_window() {
        let (store, history) = history();
        let user_id = Uuid::new_v4();
        let thirty_days = days_ago(30);

        store
            .append_entry(&ChatEntry::at(user_id, "just outside".into(), String::new(), thirty_days - 60))
            .await
            .unwrap();
        assert!(history.last_within_window(user_id).await.is_none());

        store
            .append_entry(&ChatEntry::at(user_id, "just inside".into(), String::new(), thirty_days + 60))
            .await
            .unwrap();
        let last = history.last_within_window(user_id).await.unwrap();
        assert_eq!(last.user_input, "just inside");
    }

    #[tokio::test]
    async fn test_huge_window_covers_everything() {
        let store = Arc::new(MemoryStore::default());
        let history = HistoryStore::new(store.clone(), &HistoryConfig { window_days: 1_000_000_000 });
        let user_id = Uuid::new_v4();
        store
            .append_entry(&ChatEntry::at(user_id, "long ago".into(), String::new(), 0))
            .await
            .unwrap();

        assert_eq!(history.window_start(Utc::now()), i64::MIN);
        let last = history.last_within_window(user_id).await.unwrap();
        assert_eq!(last.user_input, "long ago");

        let history = HistoryStore::new(store, &HistoryConfig { window_days: i64::MAX });
        assert_eq!(history.window_start(Utc::now()), i64::MIN);
    }

    #[tokio::test]
    async fn test_errors_are_swallowed() {
        let (store, history) = history();
        store.set_failing(true);
        let user_id = Uuid::new_v4();

        history.append(user_id, "hello", "hi").await;
        assert!(history.last_within_window(user_id).await.is_none());
    }
}
