//! LLM-assisted outcome routing.
//!
//! When an agent declares an [`LlmRouting`](crate::agent::LlmRouting) config,
//! the worker asks the [`OutcomeRouter`] to pick the outcome instead of using
//! the one returned by the task handler.
//!
//! The router builds a prompt from the agent's configured instructions, the
//! declared outcome list (with descriptions), and a dump of the current data,
//! then invokes the completion client with a declared response schema so the
//! reply always has the [`LlmDecision`] shape. The returned outcome name must
//! **exactly** match a declared outcome — no case folding, no trimming; any
//! variance is a [`RouterError::InvalidOutcome`].
//!
//! The router never mutates data destructively: on success it returns a new
//! map with `llm_reasoning` added.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::agent::AgentDefinition;
use crate::client::{ChatMessage, CompletionClient};
use crate::context::{DataMap, LLM_REASONING_KEY};
use crate::error::RouterError;

/// The structured shape the model must return
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmDecision {
    /// Must exactly match one of the agent's declared outcome names
    pub outcome: String,
    /// Short justification, stored under `llm_reasoning` in the data map
    pub reasoning: String,
    /// Optional hint about what the model expects to happen next
    #[serde(default)]
    pub next_step: Option<String>,
}

/// JSON Schema for [`LlmDecision`], passed to the completion client
pub fn decision_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "outcome": {
                "type": "string",
                "description": "Exactly one of the declared outcome names",
            },
            "reasoning": {
                "type": "string",
                "description": "Short justification for the chosen outcome",
            },
            "next_step": {
                "type": "string",
                "description": "Optional hint about the expected next step",
            },
        },
        "required": ["outcome", "reasoning"],
        "additionalProperties": false,
    })
}

/// Routes agent outcomes through a completion client
#[derive(Clone)]
pub struct OutcomeRouter {
    client: Arc<dyn CompletionClient>,
}

impl OutcomeRouter {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// Ask the model to pick one of the agent's declared outcomes
    ///
    /// On success returns `(outcome_name, data + llm_reasoning)`. Transport
    /// failures, undecodable replies, and undeclared outcome names come back
    /// as [`RouterError`]s for the worker to handle.
    pub async fn route(
        &self,
        agent: &AgentDefinition,
        data: &DataMap,
    ) -> Result<(String, DataMap), RouterError> {
        let routing = agent
            .llm_routing()
            .expect("route called without llm_routing config");

        let prompt = build_prompt(agent, data);
        debug!(agent = agent.name(), model = %routing.model, "requesting routing decision");

        let schema = decision_schema();
        let reply = self
            .client
            .chat_completion(&routing.model, &schema, &[ChatMessage::user(prompt)])
            .await
            .map_err(|e| RouterError::Transport(e.to_string()))?;

        let decision: LlmDecision = serde_json::from_value(reply)
            .map_err(|e| RouterError::MalformedDecision(e.to_string()))?;

        // Exact match only; the declared name is returned, never the model's
        // string, so downstream routing always uses canonical names.
        let matched = agent
            .find_outcome(&decision.outcome)
            .ok_or_else(|| RouterError::InvalidOutcome(decision.outcome.clone()))?;

        let mut routed = data.clone();
        routed.insert(
            LLM_REASONING_KEY.to_string(),
            Value::String(decision.reasoning),
        );

        Ok((matched.name.clone(), routed))
    }
}

/// Assemble the routing prompt
///
/// Sections: configured instructions, the outcome list (one per line, with
/// descriptions), the current data, and the exact-name constraint.
fn build_prompt(agent: &AgentDefinition, data: &DataMap) -> String {
    let routing = agent
        .llm_routing()
        .expect("build_prompt called without llm_routing config");

    let mut prompt = String::with_capacity(routing.prompt.len() + 256);
    prompt.push_str(&routing.prompt);
    prompt.push_str("\n\nAvailable outcomes:\n");

    for outcome in agent.outcomes() {
        match &outcome.description {
            Some(description) => {
                prompt.push_str(&format!("- {}: {}\n", outcome.name, description))
            }
            None => prompt.push_str(&format!("- {}\n", outcome.name)),
        }
    }

    prompt.push_str("\nCurrent data:\n");
    prompt.push_str(
        &serde_json::to_string_pretty(&Value::Object(data.clone()))
            .unwrap_or_else(|_| "{}".to_string()),
    );
    prompt.push_str(
        "\n\nChoose the most appropriate outcome. The `outcome` field of your \
         reply must be exactly one of the outcome names listed above.",
    );

    prompt
}

// ============================================================================
// TESTS
// ============================================================================
