//! Pipeline context carried through every agent.
//!
//! Context travels as reserved keys inside the data map rather than as a
//! side-channel, so any agent (and any terminal result) can be inspected for
//! provenance:
//!
//! - `_pipeline_id`: process-unique monotonic id, assigned once at the top of
//!   a run and propagated verbatim to every downstream invocation.
//! - `_retry_attempt`: incremented only by a Retry rule, removed when the
//!   pipeline forwards to a different agent (absent means 0).
//!
//! Keys starting with `_` are engine-owned; callers may pre-populate them
//! only to continue an existing pipeline.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

/// The associative data value passed between agents
pub type DataMap = serde_json::Map<String, Value>;

/// Reserved key carrying the pipeline id
pub const PIPELINE_ID_KEY: &str = "_pipeline_id";

/// Reserved key carrying the retry attempt counter
pub const RETRY_ATTEMPT_KEY: &str = "_retry_attempt";

/// Key under which the router stores the model's reasoning
pub const LLM_REASONING_KEY: &str = "llm_reasoning";

/// Process-wide pipeline id counter. Starts at 1: ids are positive.
static NEXT_PIPELINE_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh pipeline id
///
/// Monotonic and race-free under concurrent `process` calls.
pub fn next_pipeline_id() -> u64 {
    NEXT_PIPELINE_ID.fetch_add(1, Ordering::SeqCst)
}

/// Read the pipeline id out of a data map, if present
pub fn pipeline_id(data: &DataMap) -> Option<u64> {
    data.get(PIPELINE_ID_KEY).and_then(Value::as_u64)
}

/// Write the pipeline id into a data map
pub fn set_pipeline_id(data: &mut DataMap, id: u64) {
    data.insert(PIPELINE_ID_KEY.to_string(), Value::from(id));
}

/// Read the retry attempt counter; an absent key means attempt 0
pub fn retry_attempt(data: &DataMap) -> u64 {
    data.get(RETRY_ATTEMPT_KEY)
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Write the retry attempt counter
pub fn set_retry_attempt(data: &mut DataMap, attempt: u64) {
    data.insert(RETRY_ATTEMPT_KEY.to_string(), Value::from(attempt));
}

/// Remove the retry attempt counter (done when leaving an agent via Forward)
pub fn clear_retry_attempt(data: &mut DataMap) {
    data.remove(RETRY_ATTEMPT_KEY);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_are_positive_and_monotonic() {
        let a = next_pipeline_id();
        let b = next_pipeline_id();
        assert!(a >= 1);
        assert!(b > a);
    }

    #[test]
    fn ids_are_distinct_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| (0..100).map(|_| next_pipeline_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total, "pipeline ids must never collide");
    }

    #[test]
    fn pipeline_id_roundtrip() {
        let mut data = DataMap::new();
        assert_eq!(pipeline_id(&data), None);

        set_pipeline_id(&mut data, 42);
        assert_eq!(pipeline_id(&data), Some(42));
    }

    #[test]
    fn retry_attempt_defaults_to_zero() {
        let data = DataMap::new();
        assert_eq!(retry_attempt(&data), 0);
    }

    #[test]
    fn retry_attempt_set_and_clear() {
        let mut data = DataMap::new();
        set_retry_attempt(&mut data, 2);
        assert_eq!(retry_attempt(&data), 2);

        clear_retry_attempt(&mut data);
        assert_eq!(retry_attempt(&data), 0);
        assert!(!data.contains_key(RETRY_ATTEMPT_KEY));
    }

    #[test]
    fn non_numeric_attempt_reads_as_zero() {
        let mut data = DataMap::new();
        data.insert(RETRY_ATTEMPT_KEY.to_string(), json!("two"));
        assert_eq!(retry_attempt(&data), 0);
    }
}
