//! ============================================================================
//! Store Module - Database gateway for users and chat history
//! ============================================================================
//! Two logical collections live behind [`CareStore`]:
//! - `users`: one record per registered student
//! - `chat_history`: one append-only record per exchange
//!
//! ## Backends
//! - [`QdrantStore`]: Qdrant vector database. Points carry a constant zero
//!   placeholder vector; every lookup is a payload filter, never a
//!   similarity search.
//! - [`LocalStore`]: embedded redb file with the same semantics.
//!
//! ## Usage
//! ```rust,ignore
//! use care_core::{store, StoreConfig};
//!
//! let store = store::connect(&StoreConfig::default()).await?;
//! let user = store.find_user("alex@example.com").await?;
//! ```
//! ============================================================================

mod local;
#[cfg(test)]
pub(crate) mod memory;
mod qdrant;

pub use local::LocalStore;
pub use qdrant::QdrantStore;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::{StoreBackend, StoreConfig};
use crate::types::{CareResult, ChatEntry, StoreStats, User};

/// Persistence for users and chat entries
#[async_trait]
pub trait CareStore: Send + Sync {
    /// Short backend name for logs and CLI output
    fn backend_name(&self) -> &'static str;

    /// Find the first user whose phone number or email equals `identifier`
    async fn find_user(&self, identifier: &str) -> CareResult<Option<User>>;

    /// Store a new user record
    async fn insert_user(&self, user: &User) -> CareResult<()>;

    /// Append a chat entry
    async fn append_entry(&self, entry: &ChatEntry) -> CareResult<()>;

    /// Most recent entry for `user_id` with `created_at >= since`
    async fn latest_entry_since(&self, user_id: Uuid, since: i64)
        -> CareResult<Option<ChatEntry>>;

    /// Record counts per collection
    async fn stats(&self) -> CareResult<StoreStats>;
}

/// Open the configured backend and make sure both collections exist
pub async fn connect(config: &StoreConfig) -> CareResult<Arc<dyn CareStore>> {
    let store: Arc<dyn CareStore> = match config.backend {
        StoreBackend::Qdrant => Arc::new(QdrantStore::connect(config).await?),
        StoreBackend::Local => Arc::new(LocalStore::open(config)?),
    };

    info!("Store ready ({})", store.backend_name());
    Ok(store)
}
