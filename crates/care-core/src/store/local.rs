// ============================================================================
// LocalStore - Embedded Database (redb)
// ============================================================================
// Keyed table for users and an append-log table for chat history.
// Default path: ~/.student-care/care.redb (override via CARE_DB_PATH env var)
// Chat keys are "{user_id}:{created_at:020}:{entry_id}", so a range scan over
// one user's prefix yields entries in timestamp order.
// ============================================================================

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use super::CareStore;
use crate::config::StoreConfig;
use crate::types::{CareError, CareResult, ChatEntry, StoreStats, User};

type Table<'a> = TableDefinition<'a, &'static str, &'static [u8]>;

/// Embedded store for single-machine use without a Qdrant server
pub struct LocalStore {
    db: Database,
    path: PathBuf,
    user_collection: String,
    chat_collection: String,
}

impl LocalStore {
    /// Open (or create) the database file named by `config.db_path`.
    /// If unset, uses ~/.student-care/care.redb
    pub fn open(config: &StoreConfig) -> CareResult<Self> {
        let db_path = match &config.db_path {
            Some(p) => p.clone(),
            None => {
                let home = dirs::home_dir()
                    .ok_or_else(|| CareError::Connection("Cannot determine home directory".into()))?;
                let care_dir = home.join(".student-care");
                std::fs::create_dir_all(&care_dir)?;
                care_dir.join("care.redb")
            }
        };

        info!("Opening database at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| CareError::Connection(format!("Failed to open database: {}", e)))?;

        let store = Self {
            db,
            path: db_path,
            user_collection: config.user_collection.clone(),
            chat_collection: config.chat_collection.clone(),
        };

        // Ensure tables exist by doing a write transaction
        let write_txn = store.db.begin_write().map_err(storage("begin write"))?;
        {
            write_txn.open_table(store.users()).map_err(storage("create users table"))?;
            write_txn.open_table(store.chats()).map_err(storage("create chat table"))?;
        }
        write_txn.commit().map_err(storage("commit init"))?;

        Ok(store)
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn users(&self) -> Table<'_> {
        TableDefinition::new(&self.user_collection)
    }

    fn chats(&self) -> Table<'_> {
        TableDefinition::new(&self.chat_collection)
    }

    fn insert(&self, table: Table<'_>, key: &str, value: &[u8]) -> CareResult<()> {
        let write_txn = self.db.begin_write().map_err(storage("begin write"))?;
        {
            let mut table = write_txn.open_table(table).map_err(storage("open table"))?;
            table.insert(key, value).map_err(storage("insert"))?;
        }
        write_txn.commit().map_err(storage("commit"))?;
        Ok(())
    }

    fn count(&self, table: Table<'_>) -> CareResult<u64> {
        let read_txn = self.db.begin_read().map_err(storage("begin read"))?;
        let table = read_txn.open_table(table).map_err(storage("open table"))?;
        let count = table.range::<&str>(..).map_err(storage("iterate"))?.count();
        Ok(count as u64)
    }
}

fn chat_key(user_id: Uuid, created_at: i64, entry_id: Uuid) -> String {
    format!("{}:{:020}:{}", user_id, created_at.max(0), entry_id)
}

fn storage<E: std::fmt::Display>(action: &'static str) -> impl Fn(E) -> CareError {
    move |e| CareError::Storage(format!("Failed to {}: {}", action, e))
}

#[async_trait]
impl CareStore for LocalStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn find_user(&self, identifier: &str) -> CareResult<Option<User>> {
        let read_txn = self.db.begin_read().map_err(storage("begin read"))?;
        let table = read_txn.open_table(self.users()).map_err(storage("open users table"))?;

        for entry in table.range::<&str>(..).map_err(storage("iterate users"))? {
            let (_key, value) = entry.map_err(storage("read user"))?;
            let user: User = bincode::deserialize(value.value()).map_err(storage("deserialize user"))?;
            if user.matches_contact(identifier) {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    async fn insert_user(&self, user: &User) -> CareResult<()> {
        let value = bincode::serialize(user).map_err(storage("serialize user"))?;
        self.insert(self.users(), &user.id.to_string(), &value)?;

        debug!("Stored user: {}", user.id);
        Ok(())
    }

    async fn append_entry(&self, entry: &ChatEntry) -> CareResult<()> {
        let key = chat_key(entry.user_id, entry.created_at, entry.id);
        let value = bincode::serialize(entry).map_err(storage("serialize entry"))?;
        self.insert(self.chats(), &key, &value)?;

        debug!("Stored chat entry {} for user {}", entry.id, entry.user_id);
        Ok(())
    }

    async fn latest_entry_since(&self, user_id: Uuid, since: i64) -> CareResult<Option<ChatEntry>> {
        // ';' sorts directly after ':' so this bounds exactly one user's keys
        let start = format!("{}:{:020}", user_id, since.max(0));
        let end = format!("{};", user_id);

        let read_txn = self.db.begin_read().map_err(storage("begin read"))?;
        let table = read_txn.open_table(self.chats()).map_err(storage("open chat table"))?;
        let mut range = table
            .range::<&str>(start.as_str()..end.as_str())
            .map_err(storage("iterate chat history"))?;

        match range.next_back() {
            Some(entry) => {
                let (_key, value) = entry.map_err(storage("read entry"))?;
                let chat: ChatEntry =
                    bincode::deserialize(value.value()).map_err(storage("deserialize entry"))?;
                Ok(Some(chat))
            }
            None => Ok(None),
        }
    }

    async fn stats(&self) -> CareResult<StoreStats> {
        Ok(StoreStats {
            users: self.count(self.users())?,
            chat_entries: self.count(self.chats())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            db_path: Some(dir.path().join("care.redb")),
            ..StoreConfig::default()
        };
        let store = LocalStore::open(&config).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_find_user_by_phone_or_email() {
        let (_dir, store) = open_temp();
        let user = User::new(
            "Alex".to_string(),
            "+12345678901".to_string(),
            "a@b.com".to_string(),
        );
        store.insert_user(&user).await.unwrap();

        assert_eq!(store.find_user("+12345678901").await.unwrap(), Some(user.clone()));
        assert_eq!(store.find_user("a@b.com").await.unwrap(), Some(user));
        assert!(store.find_user("nobody@b.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_entry_respects_window_and_owner() {
        let (_dir, store) = open_temp();
        let alex = Uuid::new_v4();
        let sam = Uuid::new_v4();

        store
            .append_entry(&ChatEntry::at(alex, "old exam".into(), "r".into(), 1_000))
            .await
            .unwrap();
        store
            .append_entry(&ChatEntry::at(alex, "lonely lately".into(), "r".into(), 5_000))
            .await
            .unwrap();
        store
            .append_entry(&ChatEntry::at(sam, "sad".into(), "r".into(), 9_000))
            .await
            .unwrap();

        let latest = store.latest_entry_since(alex, 2_000).await.unwrap().unwrap();
        assert_eq!(latest.user_input, "lonely lately");

        assert!(store.latest_entry_since(alex, 6_000).await.unwrap().is_none());

        let sams = store.latest_entry_since(sam, 0).await.unwrap().unwrap();
        assert_eq!(sams.user_input, "sad");
    }

    #[tokio::test]
    async fn test_since_bound_is_inclusive() {
        let (_dir, store) = open_temp();
        let alex = Uuid::new_v4();

        store
            .append_entry(&ChatEntry::at(alex, "outside".into(), "r".into(), 4_999))
            .await
            .unwrap();
        assert!(store.latest_entry_since(alex, 5_000).await.unwrap().is_none());

        store
            .append_entry(&ChatEntry::at(alex, "on the edge".into(), "r".into(), 5_000))
            .await
            .unwrap();
        let latest = store.latest_entry_since(alex, 5_000).await.unwrap().unwrap();
        assert_eq!(latest.user_input, "on the edge");

        let all = store.latest_entry_since(alex, i64::MIN).await.unwrap().unwrap();
        assert_eq!(all.user_input, "on the edge");
    }

    #[tokio::test]
    async fn test_stats_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            db_path: Some(dir.path().join("care.redb")),
            ..StoreConfig::default()
        };

        {
            let store = LocalStore::open(&config).unwrap();
            let user = User::new("Sam".into(), "5551234567".into(), "s@x.org".into());
            store.insert_user(&user).await.unwrap();
            store
                .append_entry(&ChatEntry::new(user.id, "stress".into(), "r".into()))
                .await
                .unwrap();
        }

        let store = LocalStore::open(&config).unwrap();
        assert_eq!(store.path(), dir.path().join("care.redb"));
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.users, 1);
        assert_eq!(stats.chat_entries, 1);
    }
}
