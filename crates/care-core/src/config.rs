//! ============================================================================
//! Configuration - Endpoints, collection names and model settings
//! ============================================================================
//! Defaults come from environment variables where set, otherwise from the
//! constants below. The CLI overrides individual fields from its flags.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default Qdrant gRPC endpoint
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Default Ollama endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default chat model
pub const DEFAULT_MODEL: &str = "llama3.2-vision:11b";

pub const USER_COLLECTION: &str = "users";
pub const CHAT_COLLECTION: &str = "chat_history";

/// Dimension of the placeholder vector every point carries
pub const PLACEHOLDER_VECTOR_SIZE: u64 = 3;

/// How far back the previous session is looked up
pub const DEFAULT_HISTORY_WINDOW_DAYS: i64 = 30;

/// Which store implementation backs users and chat history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Qdrant vector database
    Qdrant,
    /// Embedded redb file
    Local,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Qdrant => write!(f, "qdrant"),
            StoreBackend::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(StoreBackend::Qdrant),
            "local" | "redb" => Ok(StoreBackend::Local),
            _ => Err(format!("Unknown store backend: {}", s)),
        }
    }
}

/// Store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub qdrant_url: String,
    /// Path of the redb file used by the local backend
    pub db_path: Option<PathBuf>,
    pub user_collection: String,
    pub chat_collection: String,
    pub vector_size: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: std::env::var("CARE_STORE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(StoreBackend::Qdrant),
            qdrant_url: std::env::var("QDRANT_URL")
                .unwrap_or_else(|_| DEFAULT_QDRANT_URL.to_string()),
            db_path: std::env::var("CARE_DB_PATH").ok().map(PathBuf::from),
            user_collection: USER_COLLECTION.to_string(),
            chat_collection: CHAT_COLLECTION.to_string(),
            vector_size: PLACEHOLDER_VECTOR_SIZE,
        }
    }
}

impl StoreConfig {
    /// The constant zero vector stored alongside every payload
    pub fn placeholder_vector(&self) -> Vec<f32> {
        vec![0.0; self.vector_size as usize]
    }
}

/// Chat model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    /// Request timeout; `None` waits indefinitely
    pub timeout_secs: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("OLLAMA_URL")
                .unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string()),
            model: std::env::var("CARE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            timeout_secs: None,
        }
    }
}

/// Chat history settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub window_days: i64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_HISTORY_WINDOW_DAYS,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CareConfig {
    pub store: StoreConfig,
    pub model: ModelConfig,
    pub history: HistoryConfig,
}
