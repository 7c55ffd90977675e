//! Mock completion client for testing.
//!
//! Returns configurable replies without network calls.
//!
//! # Features
//!
//! - **Reply queue**: return specific decisions in order
//! - **Failure injection**: queue transport errors between successes
//! - **Request tracking**: inspect model, schema, and prompt of every call

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ChatMessage, CompletionClient};

/// One queued reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this JSON value as the decoded completion
    Value(Value),
    /// Fail the call with this transport error message
    Error(String),
}

impl MockReply {
    /// A well-formed routing decision
    pub fn decision(outcome: &str, reasoning: &str) -> Self {
        MockReply::Value(json!({"outcome": outcome, "reasoning": reasoning}))
    }
}

/// A recorded `chat_completion` call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub response_schema: Value,
    pub messages: Vec<ChatMessage>,
}

/// Mock client that returns queued replies
#[derive(Default)]
pub struct MockClient {
    replies: Mutex<Vec<MockReply>>,
    calls: Mutex<Vec<RecordedCall>>,
    call_count: AtomicUsize,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a queue of replies, returned FIFO
    ///
    /// When the queue runs dry further calls fail with a transport error.
    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies),
            ..Default::default()
        }
    }

    /// Shorthand: a client that always has one decision queued
    pub fn with_decision(outcome: &str, reasoning: &str) -> Arc<Self> {
        Arc::new(Self::with_replies(vec![MockReply::decision(
            outcome, reasoning,
        )]))
    }

    /// Add a reply to the queue
    pub fn queue(&self, reply: MockReply) {
        self.replies.lock().unwrap().push(reply);
    }

    /// All recorded calls
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// The most recent call
    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().unwrap().last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for MockClient {
    async fn chat_completion(
        &self,
        model: &str,
        response_schema: &Value,
        messages: &[ChatMessage],
    ) -> Result<Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            model: model.to_string(),
            response_schema: response_schema.clone(),
            messages: messages.to_vec(),
        });
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let reply = {
            let mut queue = self.replies.lock().unwrap();
            if queue.is_empty() {
                None
            } else {
                Some(queue.remove(0))
            }
        };

        match reply {
            Some(MockReply::Value(value)) => Ok(value),
            Some(MockReply::Error(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("mock reply queue is empty")),
        }
    }
}
