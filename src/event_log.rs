//! Event sourcing for pipeline execution.
//!
//! Provides an audit trail alongside the tracing output.
//! - Event: envelope with id + timestamp + kind
//! - EventKind: pipeline / agent / router levels
//! - EventLog: thread-safe, append-only log

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Single event in the execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since log creation (ms)
    pub timestamp_ms: u64,
    /// Event type and data
    pub kind: EventKind,
}

/// All possible event types
///
/// Uses Arc<str> for agent names to enable zero-cost cloning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // PIPELINE LEVEL
    // ═══════════════════════════════════════════
    PipelineStarted {
        pipeline_id: u64,
        agent: Arc<str>,
    },
    PipelineCompleted {
        pipeline_id: u64,
        outcome: String,
    },
    PipelineFailed {
        pipeline_id: u64,
        error: String,
    },

    // ═══════════════════════════════════════════
    // AGENT LEVEL
    // ═══════════════════════════════════════════
    AgentStarted {
        pipeline_id: u64,
        agent: Arc<str>,
        attempt: u64,
    },
    AgentCompleted {
        pipeline_id: u64,
        agent: Arc<str>,
        outcome: String,
    },
    Forwarded {
        pipeline_id: u64,
        from: Arc<str>,
        to: Arc<str>,
    },
    RetryScheduled {
        pipeline_id: u64,
        agent: Arc<str>,
        attempt: u64,
        delay_ms: u64,
    },

    // ═══════════════════════════════════════════
    // ROUTER LEVEL
    // ═══════════════════════════════════════════
    RouterDecided {
        pipeline_id: u64,
        agent: Arc<str>,
        outcome: String,
    },
    RouterFellBack {
        pipeline_id: u64,
        agent: Arc<str>,
        error: String,
    },
}

impl EventKind {
    /// The pipeline this event belongs to
    pub fn pipeline_id(&self) -> u64 {
        match self {
            Self::PipelineStarted { pipeline_id, .. }
            | Self::PipelineCompleted { pipeline_id, .. }
            | Self::PipelineFailed { pipeline_id, .. }
            | Self::AgentStarted { pipeline_id, .. }
            | Self::AgentCompleted { pipeline_id, .. }
            | Self::Forwarded { pipeline_id, .. }
            | Self::RetryScheduled { pipeline_id, .. }
            | Self::RouterDecided { pipeline_id, .. }
            | Self::RouterFellBack { pipeline_id, .. } => *pipeline_id,
        }
    }

    /// Check if this is a pipeline-level event
    pub fn is_pipeline_event(&self) -> bool {
        matches!(
            self,
            Self::PipelineStarted { .. }
                | Self::PipelineCompleted { .. }
                | Self::PipelineFailed { .. }
        )
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    /// Snapshot of all events so far
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Events belonging to one pipeline
    pub fn filter_pipeline(&self, pipeline_id: u64) -> Vec<Event> {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind.pipeline_id() == pipeline_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
