//! ============================================================================
//! Chat Model Client - Ollama chat API
//! ============================================================================
//! Sends an ordered list of {role, content} messages and returns the reply
//! text from `message.content`. Non-streaming, no retries.
//! ============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::ModelConfig;
use crate::types::{CareError, CareResult};

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Remote language model that answers a list of messages
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, messages: Vec<ChatMessage>) -> CareResult<String>;
}

/// Client for an Ollama server
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &ModelConfig) -> CareResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| CareError::Model(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// Get the current model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn chat(&self, messages: Vec<ChatMessage>) -> CareResult<String> {
        debug!("Calling Ollama model {} with {} messages", self.model, messages.len());

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| CareError::Connection(format!("Failed to call Ollama API: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CareError::Model(format!("Ollama API error {}: {}", status, body)));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| CareError::Model(format!("Failed to parse API response: {}", e)))?;

        Ok(chat_response.message.content)
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;

    fn config(base_url: String) -> ModelConfig {
        ModelConfig {
            base_url,
            model: "llama3.2-vision:11b".to_string(),
            timeout_secs: Some(5),
        }
    }

    #[test]
    fn test_client_creation() {
        let client = OllamaClient::new(&config("http://localhost:11434/".to_string())).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.model(), "llama3.2-vision:11b");
    }

    #[tokio::test]
    async fn test_chat_returns_message_content() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/chat")
                .body_contains("\"stream\":false")
                .body_contains("I feel very lonely");
            then.status(200)
                .header("content-type", "application/json")
                .body("{\"model\":\"llama3.2-vision:11b\",\"created_at\":\"now\",\"message\":{\"role\":\"assistant\",\"content\":\"I'm so glad you shared this.\"},\"done\":true}");
        });

        let client = OllamaClient::new(&config(server.base_url())).unwrap();
        let reply = client
            .chat(vec![
                ChatMessage::system("persona"),
                ChatMessage::user("I feel very lonely"),
            ])
            .await
            .unwrap();

        mock.assert();
        assert_eq!(reply, "I'm so glad you shared this.");
    }

    #[tokio::test]
    async fn test_http_error_is_model_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/chat");
            then.status(404).body("model not found");
        });

        let client = OllamaClient::new(&config(server.base_url())).unwrap();
        let err = client.chat(vec![ChatMessage::user("hi")]).await.unwrap_err();

        assert!(matches!(err, CareError::Model(_)));
        assert!(err.to_string().contains("model not found"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        let client = OllamaClient::new(&config("http://127.0.0.1:1".to_string())).unwrap();
        let err = client.chat(vec![ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, CareError::Connection(_)));
    }
}
