//! Pipeline supervision: one isolated worker task per `process` call.
//!
//! The supervisor is the public entry point of the engine. Each call to
//! [`Supervisor::process`] spawns a fresh [`PipelineWorker`] on the tokio
//! runtime and awaits its result. A panic inside one pipeline surfaces as
//! [`PipelineError::Crashed`] to that caller only — sibling pipelines keep
//! running. Crashed workers are observed, never restarted.
//!
//! Workers share nothing mutable: the registry and configuration are
//! read-only `Arc`s and the pipeline-id counter is atomic.

use std::sync::Arc;

use tracing::error;

use crate::client::CompletionClient;
use crate::config::EngineConfig;
use crate::context::{self, DataMap};
use crate::error::PipelineError;
use crate::event_log::{EventKind, EventLog};
use crate::registry::AgentRegistry;
use crate::router::OutcomeRouter;
use crate::worker::{PipelineOutcome, PipelineWorker};

/// Spawns and observes pipeline workers
#[derive(Clone)]
pub struct Supervisor {
    registry: AgentRegistry,
    config: Arc<EngineConfig>,
    client: Option<Arc<dyn CompletionClient>>,
    event_log: EventLog,
}

impl Supervisor {
    /// Create a supervisor over a registry with default configuration
    pub fn new(registry: AgentRegistry) -> Self {
        Self {
            registry,
            config: Arc::new(EngineConfig::default()),
            client: None,
            event_log: EventLog::new(),
        }
    }

    /// Replace the engine configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Attach a completion client for agents that declare LLM routing
    pub fn with_client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The shared audit trail of every pipeline run
    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Run one pipeline starting at the named agent
    ///
    /// Returns the terminal `(outcome, data)` or the first fatal error.
    /// The returned data always contains `_pipeline_id`.
    pub async fn process(
        &self,
        agent: &str,
        mut input: DataMap,
    ) -> Result<PipelineOutcome, PipelineError> {
        let start = self
            .registry
            .get(agent)
            .ok_or_else(|| PipelineError::UnknownAgent {
                name: agent.to_string(),
            })?;

        // Assign the id before spawning so a crashed worker can still be
        // attributed in the event log.
        let pipeline_id = match context::pipeline_id(&input) {
            Some(id) => id,
            None => {
                let id = context::next_pipeline_id();
                context::set_pipeline_id(&mut input, id);
                id
            }
        };

        let worker = PipelineWorker::new(
            self.registry.clone(),
            Arc::clone(&self.config),
            self.client.clone().map(OutcomeRouter::new),
            self.event_log.clone(),
        );

        let handle = tokio::spawn(async move { worker.run(start, input).await });

        match handle.await {
            Ok(result) => result,
            Err(join_error) => {
                error!(agent, pipeline_id, %join_error, "worker died");
                self.event_log.emit(EventKind::PipelineFailed {
                    pipeline_id,
                    error: join_error.to_string(),
                });
                Err(PipelineError::Crashed {
                    reason: join_error.to_string(),
                })
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
