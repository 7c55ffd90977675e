//! Relay - agent pipeline engine
//!
//! Compose autonomous agent pipelines: a directed graph of small processing
//! units, each with a typed input/output schema and a fixed set of named
//! outcomes that forward the data to a next agent, loop back for bounded
//! retries, or terminate the pipeline. An outcome may optionally be chosen by
//! an LLM router instead of the agent's own code.
//!
//! ## Architecture
//!
//! - `schema`: declarative field typing and validation for agent boundaries
//! - `agent`: agent definitions, outcomes, routing rules, fluent builder
//! - `registry`: name → definition resolution at routing time
//! - `router`: LLM-assisted outcome selection with strict response validation
//! - `worker`: the per-pipeline execution loop (validate → run → route)
//! - `supervisor`: one isolated tokio task per pipeline, crash observation
//! - `client`: completion transport (OpenAI-compatible + mock)
//! - `config`: process-wide read-only settings (TOML + env)
//! - `context`: reserved data keys and the pipeline-id counter
//! - `event_log`: append-only audit trail of every run
//! - `error`: error types with fix suggestions
//!
//! ## Quick start
//!
//! ```rust
//! use relay::{AgentDefinition, AgentRegistry, DataMap, RoutingRule, Supervisor};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = AgentRegistry::new();
//!     registry
//!         .register(
//!             AgentDefinition::builder("shout")
//!                 .outcome("done", RoutingRule::Terminal)
//!                 .handler(|input| {
//!                     let text = input["text"].as_str().unwrap_or_default().to_uppercase();
//!                     let mut out = DataMap::new();
//!                     out.insert("text".into(), json!(text));
//!                     Ok(("done".into(), out))
//!                 })
//!                 .build()
//!                 .unwrap(),
//!         )
//!         .unwrap();
//!
//!     let supervisor = Supervisor::new(registry);
//!
//!     let mut input = DataMap::new();
//!     input.insert("text".into(), json!("hello"));
//!
//!     let result = supervisor.process("shout", input).await.unwrap();
//!     assert_eq!(result.outcome, "done");
//!     assert_eq!(result.data["text"], json!("HELLO"));
//! }
//! ```

pub mod agent;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod event_log;
pub mod registry;
pub mod router;
pub mod schema;
pub mod supervisor;
pub mod worker;

pub use agent::{
    AgentBuilder, AgentDefinition, LlmRouting, Outcome, RoutingRule, TaskHandler,
    DEFAULT_ROUTING_MODEL,
};
pub use client::{
    ChatMessage, CompletionClient, MessageRole, MockClient, MockReply, OpenAiClient,
};
pub use config::{Backoff, EngineConfig, LogLevel};
pub use context::{
    next_pipeline_id, pipeline_id, retry_attempt, DataMap, LLM_REASONING_KEY, PIPELINE_ID_KEY,
    RETRY_ATTEMPT_KEY,
};
pub use error::{
    Boundary, BuilderError, ConfigError, FixSuggestion, PipelineError, RegistryError, RelayError,
    RouterError, SchemaError, TaskError,
};
pub use event_log::{Event, EventKind, EventLog};
pub use registry::AgentRegistry;
pub use router::{decision_schema, LlmDecision, OutcomeRouter};
pub use schema::{FieldSpec, FieldType, Schema};
pub use supervisor::Supervisor;
pub use worker::{retry_delay, PipelineOutcome, PipelineWorker};
