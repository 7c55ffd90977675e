//! OpenAI-compatible completion client.
//!
//! Uses the `response_format: json_schema` mode so the endpoint enforces the
//! declared response shape before the router ever sees it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{ChatMessage, CompletionClient};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Production completion client for OpenAI-compatible endpoints
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    client: Client,
}

impl OpenAiClient {
    /// Create a client reading the API key from `OPENAI_API_KEY`
    pub fn new() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?;
        Ok(Self::with_api_key(api_key))
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
        }
    }

    /// Override the endpoint base URL (proxies, self-hosted gateways, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn chat_completion(
        &self,
        model: &str,
        response_schema: &Value,
        messages: &[ChatMessage],
    ) -> Result<Value> {
        let wire_messages: Vec<Value> = messages
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
            .collect();

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&json!({
                "model": model,
                "messages": wire_messages,
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {
                        "name": "routing_decision",
                        "schema": response_schema,
                    },
                },
            }))
            .send()
            .await
            .context("Failed to send request to completion endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("completion endpoint error {}: {}", status, body);
        }

        let body: Value = response.json().await?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .context("Invalid response format from completion endpoint")?;

        serde_json::from_str(content).context("Completion reply is not valid JSON")
    }
}
