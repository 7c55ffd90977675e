//! Error types with fix suggestions.
//!
//! Each layer keeps its own error enum:
//!
//! - `SchemaError`: field declarations and data validation
//! - `BuilderError`: fluent agent construction
//! - `RegistryError`: agent registration
//! - `RouterError`: LLM outcome routing (non-fatal to the pipeline)
//! - `TaskError`: failures returned by user task handlers
//! - `ConfigError`: configuration loading/saving
//! - `PipelineError`: everything a pipeline run can surface to its caller
//!
//! `RelayError` wraps the specific errors for callers that want a single
//! top-level type, and the `FixSuggestion` trait attaches an actionable hint
//! to every variant.

use thiserror::Error;

/// Trait for errors that can provide fix suggestions
///
/// All relay errors implement this trait so tools built on the engine can
/// show users how to resolve the error.
pub trait FixSuggestion {
    /// Get a fix suggestion for this error, if available
    fn fix_suggestion(&self) -> Option<&str>;
}

// ============================================================================
// SCHEMA ERRORS
// ============================================================================

/// Errors produced by schema construction and data validation
///
/// Validation reports the **first** violation found, in field declaration
/// order.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("duplicate field '{name}' in schema")]
    DuplicateField { name: String },

    #[error("field '{name}' is required and must not declare a default")]
    RequiredWithDefault { name: String },

    #[error("missing required field '{field}'")]
    MissingRequired { field: String },

    #[error("field '{field}' has wrong type: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("field '{field}' element {index} has wrong type: expected {expected}, got {actual}")]
    ElementMismatch {
        field: String,
        index: usize,
        expected: String,
        actual: String,
    },
}

impl FixSuggestion for SchemaError {
    fn fix_suggestion(&self) -> Option<&str> {
        Some(match self {
            SchemaError::DuplicateField { .. } => "Rename one of the duplicate fields",
            SchemaError::RequiredWithDefault { .. } => {
                "Drop the default, or mark the field optional"
            }
            SchemaError::MissingRequired { .. } => {
                "Provide the field in the data map, or declare it optional with a default"
            }
            SchemaError::TypeMismatch { .. } => {
                "Check the value against the declared field type (string, integer, float, boolean, map, array)"
            }
            SchemaError::ElementMismatch { .. } => {
                "Ensure every array element matches the declared element type"
            }
        })
    }
}

// ============================================================================
// BUILDER ERRORS
// ============================================================================

/// Errors produced by `AgentBuilder::build`
#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("agent '{agent}' declares no outcomes")]
    NoOutcomes { agent: String },

    #[error("agent '{agent}' declares outcome '{name}' more than once")]
    DuplicateOutcome { agent: String, name: String },

    #[error("agent '{agent}' has no task handler")]
    MissingHandler { agent: String },

    #[error("agent '{agent}' outcome '{outcome}' forwards to an empty target")]
    EmptyForwardTarget { agent: String, outcome: String },

    #[error("agent name must not be empty")]
    EmptyName,

    #[error("{0}")]
    Schema(#[from] SchemaError),
}

impl FixSuggestion for BuilderError {
    fn fix_suggestion(&self) -> Option<&str> {
        Some(match self {
            BuilderError::NoOutcomes { .. } => {
                "Declare at least one outcome: .outcome(\"done\", RoutingRule::Terminal)"
            }
            BuilderError::DuplicateOutcome { .. } => "Use unique outcome names within an agent",
            BuilderError::MissingHandler { .. } => "Call .handler(...) before .build()",
            BuilderError::EmptyForwardTarget { .. } => {
                "Forward targets must name a registered agent"
            }
            BuilderError::EmptyName => "Give the agent a non-empty name",
            BuilderError::Schema(e) => return e.fix_suggestion(),
        })
    }
}

// ============================================================================
// REGISTRY ERRORS
// ============================================================================

/// Errors produced by `AgentRegistry::register`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("agent '{name}' is already registered")]
    DuplicateAgent { name: String },
}

impl FixSuggestion for RegistryError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            RegistryError::DuplicateAgent { .. } => {
                Some("Register each agent once, or rename the new agent")
            }
        }
    }
}

// ============================================================================
// ROUTER ERRORS (non-fatal)
// ============================================================================

/// Errors produced by the LLM outcome router
///
/// Router errors never abort a pipeline: the worker logs them and keeps the
/// outcome chosen by the task handler.
#[derive(Error, Debug)]
pub enum RouterError {
    /// The completion transport failed (network, auth, rate limit)
    #[error("completion transport failed: {0}")]
    Transport(String),

    /// The model returned an outcome name not declared by the agent
    #[error("model returned undeclared outcome '{0}'")]
    InvalidOutcome(String),

    /// The model reply could not be decoded into a routing decision
    #[error("malformed routing decision: {0}")]
    MalformedDecision(String),
}

impl FixSuggestion for RouterError {
    fn fix_suggestion(&self) -> Option<&str> {
        Some(match self {
            RouterError::Transport(_) => "Check API credentials and network connectivity",
            RouterError::InvalidOutcome(_) => {
                "List every valid outcome in the routing prompt; names are matched exactly"
            }
            RouterError::MalformedDecision(_) => {
                "Ensure the completion client enforces the declared response schema"
            }
        })
    }
}

// ============================================================================
// TASK ERRORS
// ============================================================================

/// Failure returned by a user task handler
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct TaskError(pub String);

impl TaskError {
    pub fn new(reason: impl Into<String>) -> Self {
        TaskError(reason.into())
    }
}

impl From<&str> for TaskError {
    fn from(s: &str) -> Self {
        TaskError(s.to_string())
    }
}

impl From<String> for TaskError {
    fn from(s: String) -> Self {
        TaskError(s)
    }
}

// ============================================================================
// CONFIG ERRORS
// ============================================================================

/// Errors produced by configuration loading/saving
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {reason}")]
    Read { reason: String },

    #[error("failed to parse config file: {reason}")]
    Parse { reason: String },

    #[error("failed to write config file: {reason}")]
    Write { reason: String },
}

impl FixSuggestion for ConfigError {
    fn fix_suggestion(&self) -> Option<&str> {
        Some(match self {
            ConfigError::Read { .. } => "Check the config path exists and is readable",
            ConfigError::Parse { .. } => "Check TOML syntax in the config file",
            ConfigError::Write { .. } => "Check directory permissions for the config path",
        })
    }
}

// ============================================================================
// PIPELINE ERRORS (fatal)
// ============================================================================

/// Which boundary of an agent failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Input,
    Output,
}

impl std::fmt::Display for Boundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Boundary::Input => write!(f, "input"),
            Boundary::Output => write!(f, "output"),
        }
    }
}

/// Fatal errors surfaced to the caller of a pipeline run
///
/// Any of these short-circuits further routing in the current pipeline.
/// Sibling pipelines are unaffected.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input or output data did not match the agent's declared schema
    #[error("agent '{agent}' {boundary} validation failed: {source}")]
    Validation {
        agent: String,
        boundary: Boundary,
        source: SchemaError,
    },

    /// The handler (or the router) produced an outcome the agent never declared
    #[error("agent '{agent}' produced undeclared outcome '{outcome}'")]
    UnknownOutcome { agent: String, outcome: String },

    /// A Forward rule named an agent missing from the registry
    #[error("forward target '{name}' is not registered")]
    UnknownAgent { name: String },

    /// The retry bound was exceeded
    #[error("Max retry attempts ({max_attempts}) exceeded")]
    RetryExhausted { max_attempts: u32 },

    /// The user task handler returned an error
    #[error("agent '{agent}' task failed: {reason}")]
    Task { agent: String, reason: String },

    /// The worker died unexpectedly (panic or abort)
    #[error("pipeline crashed: {reason}")]
    Crashed { reason: String },
}

impl FixSuggestion for PipelineError {
    fn fix_suggestion(&self) -> Option<&str> {
        Some(match self {
            PipelineError::Validation { source, .. } => return source.fix_suggestion(),
            PipelineError::UnknownOutcome { .. } => {
                "Declare the outcome on the agent, or fix the handler to return a declared name"
            }
            PipelineError::UnknownAgent { .. } => {
                "Register the target agent before processing, or fix the Forward target name"
            }
            PipelineError::RetryExhausted { .. } => {
                "Raise max_attempts on the retry outcome, or make the task succeed sooner"
            }
            PipelineError::Task { .. } => "Inspect the handler's error reason",
            PipelineError::Crashed { .. } => {
                "Check logs for a panic in the task handler; panics abort only their own pipeline"
            }
        })
    }
}

// ============================================================================
// TOP-LEVEL WRAPPER
// ============================================================================

/// Top-level error type wrapping the specific errors from each module
///
/// Useful for applications that assemble agents, configuration, and pipeline
/// runs behind a single `Result` type.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    #[error("{0}")]
    Builder(#[from] BuilderError),

    #[error("{0}")]
    Registry(#[from] RegistryError),

    #[error("{0}")]
    Schema(#[from] SchemaError),

    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl FixSuggestion for RelayError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            RelayError::Pipeline(e) => e.fix_suggestion(),
            RelayError::Builder(e) => e.fix_suggestion(),
            RelayError::Registry(e) => e.fix_suggestion(),
            RelayError::Schema(e) => e.fix_suggestion(),
            RelayError::Config(e) => e.fix_suggestion(),
        }
    }
}

/// Format an error with its fix suggestion for display
pub fn format_error_with_suggestion<E: std::error::Error + FixSuggestion>(error: &E) -> String {
    let mut result = error.to_string();
    if let Some(suggestion) = error.fix_suggestion() {
        result.push_str("\n  Fix: ");
        result.push_str(suggestion);
    }
    result
}

// ============================================================================
// TESTS
// ============================================================================
