//! Completion client abstraction.
//!
//! The router talks to LLM backends through the [`CompletionClient`] trait:
//! a structured-output chat completion with a declared response schema.
//!
//! Implementations:
//!
//! - [`OpenAiClient`] — production client for OpenAI-compatible endpoints
//! - [`MockClient`] — test client with queued replies, request recording,
//!   and failure injection

mod mock;
mod openai;

pub use mock::{MockClient, MockReply};
pub use openai::OpenAiClient;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A single chat message
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Role for chat messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    /// Wire name used by chat completion APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Structured-output chat completion transport
///
/// `response_schema` is a JSON Schema object the reply must satisfy; the
/// returned `Value` is the decoded JSON body of the model's message.
/// Transport failures come back as errors and are the caller's to interpret.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn chat_completion(
        &self,
        model: &str,
        response_schema: &Value,
        messages: &[ChatMessage],
    ) -> Result<Value>;
}
