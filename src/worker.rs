//! Pipeline worker: drives one whole pipeline run.
//!
//! A worker is ephemeral — one per top-level `process` call. It executes the
//! per-agent lifecycle (merge defaults → validate input → run task → validate
//! output → propagate context → optional LLM override → resolve routing) and
//! follows Forward/Retry rules **iteratively**, holding a current agent and
//! current data until a Terminal outcome or a fatal error. Long pipelines
//! never grow the stack.
//!
//! State machine per agent:
//! `ValidatingInput → Running → ValidatingOutput → [LlmRouting?] → Routing →
//! {Forward | Retry | Terminal | Error}`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, instrument, warn};

use crate::agent::{AgentDefinition, RoutingRule};
use crate::config::{Backoff, EngineConfig};
use crate::context::{
    self, clear_retry_attempt, retry_attempt, set_pipeline_id, set_retry_attempt, DataMap,
    RETRY_ATTEMPT_KEY,
};
use crate::error::{Boundary, PipelineError};
use crate::event_log::{EventKind, EventLog};
use crate::registry::AgentRegistry;
use crate::router::OutcomeRouter;

/// Terminal result of a pipeline run
///
/// `data` always carries `_pipeline_id`; beyond that it is the last agent's
/// output verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub outcome: String,
    pub data: DataMap,
}

/// Compute the backoff delay before a retry attempt (1-indexed)
///
/// Linear: `attempt × base`. Exponential: `2^(attempt−1) × base`.
pub fn retry_delay(attempt: u32, backoff: Backoff, base: Duration) -> Duration {
    let attempt = attempt.max(1);
    match backoff {
        Backoff::Linear => base.saturating_mul(attempt),
        Backoff::Exponential => {
            let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
            base.saturating_mul(factor)
        }
    }
}

/// Executes one pipeline run end-to-end
pub struct PipelineWorker {
    registry: AgentRegistry,
    config: Arc<EngineConfig>,
    router: Option<OutcomeRouter>,
    event_log: EventLog,
}

impl PipelineWorker {
    pub fn new(
        registry: AgentRegistry,
        config: Arc<EngineConfig>,
        router: Option<OutcomeRouter>,
        event_log: EventLog,
    ) -> Self {
        Self {
            registry,
            config,
            router,
            event_log,
        }
    }

    /// Run the whole pipeline starting at `start`
    #[instrument(skip_all, fields(agent = %start.name()))]
    pub async fn run(
        &self,
        start: Arc<AgentDefinition>,
        input: DataMap,
    ) -> Result<PipelineOutcome, PipelineError> {
        let pipeline_id = match context::pipeline_id(&input) {
            Some(id) => id,
            None => context::next_pipeline_id(),
        };

        self.event_log.emit(EventKind::PipelineStarted {
            pipeline_id,
            agent: start.name().into(),
        });

        let result = self.drive(pipeline_id, start, input).await;

        match &result {
            Ok(outcome) => {
                self.event_log.emit(EventKind::PipelineCompleted {
                    pipeline_id,
                    outcome: outcome.outcome.clone(),
                });
            }
            Err(e) => {
                self.event_log.emit(EventKind::PipelineFailed {
                    pipeline_id,
                    error: e.to_string(),
                });
            }
        }

        result
    }

    /// The routing loop: step agents until Terminal or a fatal error
    async fn drive(
        &self,
        pipeline_id: u64,
        mut current: Arc<AgentDefinition>,
        mut data: DataMap,
    ) -> Result<PipelineOutcome, PipelineError> {
        loop {
            let agent = Arc::clone(&current);
            let attempt = retry_attempt(&data);

            debug!(agent = agent.name(), pipeline_id, attempt, "starting");
            self.event_log.emit(EventKind::AgentStarted {
                pipeline_id,
                agent: agent.name().into(),
                attempt,
            });

            // ValidatingInput
            agent.input_schema().merge_defaults(&mut data);
            if let Err(e) = agent.input_schema().validate(&data) {
                error!(agent = agent.name(), pipeline_id, %e, "input validation failed");
                return Err(PipelineError::Validation {
                    agent: agent.name().to_string(),
                    boundary: Boundary::Input,
                    source: e,
                });
            }

            // Running
            let carried_attempt = data.contains_key(RETRY_ATTEMPT_KEY).then_some(attempt);
            let (mut outcome_name, mut output) = agent.handle_task(data).map_err(|e| {
                error!(agent = agent.name(), pipeline_id, %e, "task failed");
                PipelineError::Task {
                    agent: agent.name().to_string(),
                    reason: e.to_string(),
                }
            })?;

            // ValidatingOutput
            if let Err(e) = agent.output_schema().validate(&output) {
                error!(agent = agent.name(), pipeline_id, %e, "output validation failed");
                return Err(PipelineError::Validation {
                    agent: agent.name().to_string(),
                    boundary: Boundary::Output,
                    source: e,
                });
            }

            // Propagate context. The retry counter survives handlers that
            // build their output from scratch; a handler that sets it
            // explicitly wins.
            set_pipeline_id(&mut output, pipeline_id);
            if let Some(carried) = carried_attempt {
                if !output.contains_key(RETRY_ATTEMPT_KEY) {
                    set_retry_attempt(&mut output, carried);
                }
            }

            // LlmRouting (optional, never fatal)
            if agent.llm_routing().is_some() {
                match &self.router {
                    Some(router) => match router.route(&agent, &output).await {
                        Ok((llm_outcome, routed)) => {
                            debug!(
                                agent = agent.name(),
                                pipeline_id,
                                outcome = %llm_outcome,
                                "router decision applied"
                            );
                            self.event_log.emit(EventKind::RouterDecided {
                                pipeline_id,
                                agent: agent.name().into(),
                                outcome: llm_outcome.clone(),
                            });
                            outcome_name = llm_outcome;
                            output = routed;
                        }
                        Err(e) => {
                            warn!(
                                agent = agent.name(),
                                pipeline_id,
                                %e,
                                "router failed, keeping task outcome"
                            );
                            self.event_log.emit(EventKind::RouterFellBack {
                                pipeline_id,
                                agent: agent.name().into(),
                                error: e.to_string(),
                            });
                        }
                    },
                    None => {
                        warn!(
                            agent = agent.name(),
                            pipeline_id,
                            "llm routing declared but no completion client configured"
                        );
                        self.event_log.emit(EventKind::RouterFellBack {
                            pipeline_id,
                            agent: agent.name().into(),
                            error: "no completion client configured".to_string(),
                        });
                    }
                }
            }

            // Routing
            let Some(outcome) = agent.find_outcome(&outcome_name) else {
                error!(
                    agent = agent.name(),
                    pipeline_id,
                    outcome = %outcome_name,
                    "undeclared outcome"
                );
                return Err(PipelineError::UnknownOutcome {
                    agent: agent.name().to_string(),
                    outcome: outcome_name,
                });
            };

            self.event_log.emit(EventKind::AgentCompleted {
                pipeline_id,
                agent: agent.name().into(),
                outcome: outcome.name.clone(),
            });

            match &outcome.rule {
                RoutingRule::Forward { to } => {
                    let Some(next) = self.registry.get(to) else {
                        error!(agent = agent.name(), pipeline_id, target = %to, "forward target missing");
                        return Err(PipelineError::UnknownAgent { name: to.clone() });
                    };

                    debug!(
                        agent = agent.name(),
                        pipeline_id,
                        to = next.name(),
                        outcome = %outcome.name,
                        "forwarding"
                    );
                    self.event_log.emit(EventKind::Forwarded {
                        pipeline_id,
                        from: agent.name().into(),
                        to: next.name().into(),
                    });

                    // The retry counter belongs to the agent being left.
                    if next.name() != agent.name() {
                        clear_retry_attempt(&mut output);
                    }
                    current = next;
                    data = output;
                }
                RoutingRule::Retry { max_attempts } => {
                    let max = max_attempts.unwrap_or(self.config.default_retry_attempts);
                    let next_attempt = retry_attempt(&output) + 1;

                    if next_attempt > u64::from(max) {
                        error!(
                            agent = agent.name(),
                            pipeline_id, max_attempts = max, "retries exhausted"
                        );
                        return Err(PipelineError::RetryExhausted { max_attempts: max });
                    }

                    set_retry_attempt(&mut output, next_attempt);
                    let delay = retry_delay(
                        next_attempt as u32,
                        self.config.retry_backoff,
                        self.config.retry_base(),
                    );

                    debug!(
                        agent = agent.name(),
                        pipeline_id,
                        attempt = next_attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retry attempt"
                    );
                    self.event_log.emit(EventKind::RetryScheduled {
                        pipeline_id,
                        agent: agent.name().into(),
                        attempt: next_attempt,
                        delay_ms: delay.as_millis() as u64,
                    });

                    tokio::time::sleep(delay).await;
                    data = output;
                    // same agent, next attempt
                }
                RoutingRule::Terminal => {
                    debug!(
                        agent = agent.name(),
                        pipeline_id,
                        outcome = %outcome.name,
                        "completed"
                    );
                    return Ok(PipelineOutcome {
                        outcome: outcome.name.clone(),
                        data: output,
                    });
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
