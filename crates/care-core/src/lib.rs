//! ============================================================================
//! CARE-CORE: student-care's engine
//! ============================================================================
//! This crate handles all backend logic for the student-care companion:
//! - User registry and chat history over Qdrant or an embedded redb file
//! - Persona prompt, keyword screening and the Ollama chat client
//! - Keyword-matched follow-up questions from the previous session
//! - The interactive session loop
//! ============================================================================

pub mod config;
pub mod follow_up;
pub mod history;
pub mod llm;
pub mod persona;
pub mod registry;
pub mod session;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use config::{CareConfig, HistoryConfig, ModelConfig, StoreBackend, StoreConfig};
pub use history::HistoryStore;
pub use llm::{ChatMessage, ChatModel, OllamaClient};
pub use persona::PersonaResponder;
pub use registry::UserRegistry;
pub use session::{Persistence, Session, SessionEnd};
pub use store::CareStore;
pub use types::*;
