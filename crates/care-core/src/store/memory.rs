//! In-memory store used by unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use super::CareStore;
use crate::types::{CareError, CareResult, ChatEntry, StoreStats, User};

#[derive(Default)]
pub struct MemoryStore {
    pub users: Mutex<Vec<User>>,
    pub entries: Mutex<Vec<ChatEntry>>,
    /// When set, every operation fails with a storage error
    pub failing: AtomicBool,
}

impl MemoryStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> CareResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CareError::Storage("store unavailable".to_string()));
        }
        Ok(())
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn entries(&self) -> Vec<ChatEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CareStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn find_user(&self, identifier: &str) -> CareResult<Option<User>> {
        self.check()?;
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.matches_contact(identifier)).cloned())
    }

    async fn insert_user(&self, user: &User) -> CareResult<()> {
        self.check()?;
        self.users.lock().unwrap().push(user.clone());
        Ok(())
    }

    async fn append_entry(&self, entry: &ChatEntry) -> CareResult<()> {
        self.check()?;
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn latest_entry_since(&self, user_id: Uuid, since: i64) -> CareResult<Option<ChatEntry>> {
        self.check()?;
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .filter(|e| e.user_id == user_id && e.created_at >= since)
            .max_by_key(|e| e.created_at)
            .cloned())
    }

    async fn stats(&self) -> CareResult<StoreStats> {
        self.check()?;
        Ok(StoreStats {
            users: self.users.lock().unwrap().len() as u64,
            chat_entries: self.entries.lock().unwrap().len() as u64,
        })
    }
}
