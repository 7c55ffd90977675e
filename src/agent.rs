//! Agent definitions and the fluent builder for constructing them.
//!
//! An [`AgentDefinition`] is the static description the worker consults at
//! runtime: input/output schemas, the ordered outcome table, the task
//! handler, and an optional LLM routing config. Definitions are built once
//! via [`AgentBuilder`], shared as `Arc`, and never mutated during execution.
//!
//! Agents reference each other by **name** (resolved through the registry at
//! routing time), so cyclic graphs and self-loops need no special casing at
//! construction.

use std::fmt;
use std::sync::Arc;

use crate::context::DataMap;
use crate::error::{BuilderError, TaskError};
use crate::schema::{FieldSpec, Schema};

/// Default model for LLM-assisted routing
pub const DEFAULT_ROUTING_MODEL: &str = "gpt-4o-mini";

/// What the engine does when an outcome is selected
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingRule {
    /// Hand the data to the named agent (may be the current agent itself)
    Forward { to: String },
    /// Loop back to the same agent, bounded by `max_attempts`
    /// (`None` falls back to the engine-wide default)
    Retry { max_attempts: Option<u32> },
    /// End the pipeline and return `(outcome, data)` to the caller
    Terminal,
}

impl RoutingRule {
    /// Shorthand for a Forward rule
    pub fn forward(to: impl Into<String>) -> Self {
        RoutingRule::Forward { to: to.into() }
    }

    /// Shorthand for a Retry rule with an explicit bound
    pub fn retry(max_attempts: u32) -> Self {
        RoutingRule::Retry {
            max_attempts: Some(max_attempts),
        }
    }
}

/// A named result branch of an agent, mapped to a routing rule
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub name: String,
    pub rule: RoutingRule,
    /// Surfaced in the LLM routing prompt, one line per outcome
    pub description: Option<String>,
}

/// LLM routing configuration: when present, the model picks the outcome
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRouting {
    pub model: String,
    pub prompt: String,
}

impl LlmRouting {
    /// Routing config with the default model
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: DEFAULT_ROUTING_MODEL.to_string(),
            prompt: prompt.into(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// The user task: consumes validated input, produces an outcome name and
/// output data, or fails
pub type TaskHandler =
    Arc<dyn Fn(DataMap) -> Result<(String, DataMap), TaskError> + Send + Sync + 'static>;

/// Static description of one agent
#[derive(Clone)]
pub struct AgentDefinition {
    name: Arc<str>,
    input_schema: Schema,
    output_schema: Schema,
    outcomes: Vec<Outcome>,
    handler: TaskHandler,
    llm_routing: Option<LlmRouting>,
}

impl AgentDefinition {
    /// Start building an agent
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_schema(&self) -> &Schema {
        &self.input_schema
    }

    pub fn output_schema(&self) -> &Schema {
        &self.output_schema
    }

    /// Declared outcomes, in declaration order
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn llm_routing(&self) -> Option<&LlmRouting> {
        self.llm_routing.as_ref()
    }

    /// Find an outcome by exact name, in declaration order
    pub fn find_outcome(&self, name: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    /// Run the user task. Input has already been default-merged and validated.
    pub fn handle_task(&self, input: DataMap) -> Result<(String, DataMap), TaskError> {
        (self.handler)(input)
    }
}

impl fmt::Debug for AgentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDefinition")
            .field("name", &self.name)
            .field("outcomes", &self.outcomes)
            .field("llm_routing", &self.llm_routing)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Fluent builder for [`AgentDefinition`]
///
/// ```rust
/// use relay::{AgentDefinition, FieldSpec, FieldType, RoutingRule};
/// use serde_json::json;
///
/// let agent = AgentDefinition::builder("greeter")
///     .input_field(FieldSpec::required("name", FieldType::String))
///     .output_field(FieldSpec::required("greeting", FieldType::String))
///     .outcome("done", RoutingRule::Terminal)
///     .handler(|input| {
///         let name = input["name"].as_str().unwrap_or("world");
///         let mut out = serde_json::Map::new();
///         out.insert("greeting".into(), json!(format!("Hello {name}")));
///         Ok(("done".into(), out))
///     })
///     .build()
///     .unwrap();
///
/// assert_eq!(agent.name(), "greeter");
/// ```
pub struct AgentBuilder {
    name: String,
    input_fields: Vec<FieldSpec>,
    output_fields: Vec<FieldSpec>,
    outcomes: Vec<Outcome>,
    handler: Option<TaskHandler>,
    llm_routing: Option<LlmRouting>,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_fields: Vec::new(),
            output_fields: Vec::new(),
            outcomes: Vec::new(),
            handler: None,
            llm_routing: None,
        }
    }

    /// Declare an input field
    pub fn input_field(mut self, field: FieldSpec) -> Self {
        self.input_fields.push(field);
        self
    }

    /// Declare an output field
    pub fn output_field(mut self, field: FieldSpec) -> Self {
        self.output_fields.push(field);
        self
    }

    /// Declare an outcome; declaration order is preserved for routing and
    /// for the LLM prompt
    pub fn outcome(mut self, name: impl Into<String>, rule: RoutingRule) -> Self {
        self.outcomes.push(Outcome {
            name: name.into(),
            rule,
            description: None,
        });
        self
    }

    /// Declare an outcome with a description for the LLM routing prompt
    pub fn outcome_described(
        mut self,
        name: impl Into<String>,
        rule: RoutingRule,
        description: impl Into<String>,
    ) -> Self {
        self.outcomes.push(Outcome {
            name: name.into(),
            rule,
            description: Some(description.into()),
        });
        self
    }

    /// Set the task handler
    pub fn handler<F>(mut self, f: F) -> Self
    where
        F: Fn(DataMap) -> Result<(String, DataMap), TaskError> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(f));
        self
    }

    /// Enable LLM-assisted routing
    pub fn llm_routing(mut self, routing: LlmRouting) -> Self {
        self.llm_routing = Some(routing);
        self
    }

    /// Validate the declaration and produce the definition
    pub fn build(self) -> Result<AgentDefinition, BuilderError> {
        if self.name.is_empty() {
            return Err(BuilderError::EmptyName);
        }
        if self.outcomes.is_empty() {
            return Err(BuilderError::NoOutcomes { agent: self.name });
        }
        for (i, outcome) in self.outcomes.iter().enumerate() {
            if self.outcomes[..i].iter().any(|o| o.name == outcome.name) {
                return Err(BuilderError::DuplicateOutcome {
                    agent: self.name,
                    name: outcome.name.clone(),
                });
            }
            if let RoutingRule::Forward { to } = &outcome.rule {
                if to.is_empty() {
                    return Err(BuilderError::EmptyForwardTarget {
                        agent: self.name,
                        outcome: outcome.name.clone(),
                    });
                }
            }
        }

        let handler = self.handler.ok_or(BuilderError::MissingHandler {
            agent: self.name.clone(),
        })?;

        Ok(AgentDefinition {
            name: Arc::from(self.name.as_str()),
            input_schema: Schema::new(self.input_fields)?,
            output_schema: Schema::new(self.output_fields)?,
            outcomes: self.outcomes,
            handler,
            llm_routing: self.llm_routing,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
