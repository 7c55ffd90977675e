//! # Pipeline Engine Tests
//!
//! End-to-end tests of the agent execution engine:
//! - Greeter pipeline: static Forward routing to a terminal agent
//! - Retry protocol: bounded self-loops with exponential backoff
//! - Concurrent pipelines: isolation and distinct pipeline ids
//! - LLM routing: decision override and graceful fallback
//!
//! ## Test Categories
//!
//! 1. Greeter tests - supported/unsupported language routing
//! 2. Retry tests - backoff timing and exhaustion
//! 3. Concurrency tests - five parallel pipelines, no cross-contamination
//! 4. Routing tests - LLM override precedence

use std::sync::Arc;
use std::time::Duration;

use relay::{
    retry_attempt, AgentDefinition, AgentRegistry, DataMap, FieldSpec, FieldType, LlmRouting,
    MockClient, PipelineError, RoutingRule, Supervisor, LLM_REASONING_KEY, PIPELINE_ID_KEY,
    RETRY_ATTEMPT_KEY,
};
use serde_json::json;

// Fixed timestamp so greetings are deterministic.
const PROCESSED_AT: &str = "2024-06-01T12:00:00Z";

// ============================================================================
// TEST HELPERS
// ============================================================================

fn data(value: serde_json::Value) -> DataMap {
    value.as_object().unwrap().clone()
}

/// The greeter pipeline: greeter → formatter (supported) or fallback
/// (unsupported).
fn greeter_registry() -> AgentRegistry {
    let registry = AgentRegistry::new();

    registry
        .register(
            AgentDefinition::builder("greeter")
                .input_field(FieldSpec::required("name", FieldType::String))
                .input_field(
                    FieldSpec::optional("language", FieldType::String).with_default("en"),
                )
                .output_field(FieldSpec::optional("greeting", FieldType::String))
                .output_field(FieldSpec::optional("language", FieldType::String))
                .output_field(
                    FieldSpec::optional("unsupported_language", FieldType::String),
                )
                .outcome("supported_language", RoutingRule::forward("formatter"))
                .outcome("unsupported_language", RoutingRule::forward("fallback"))
                .handler(|input| {
                    let name = input["name"].as_str().unwrap_or_default();
                    let language = input["language"].as_str().unwrap_or("en");

                    let greeting = match language {
                        "en" => format!("Hello {name}"),
                        "es" => format!("¡Hola {name}"),
                        "fr" => format!("Bonjour {name}"),
                        _ => {
                            let mut out = DataMap::new();
                            out.insert("unsupported_language".into(), json!(language));
                            return Ok(("unsupported_language".to_string(), out));
                        }
                    };

                    let mut out = DataMap::new();
                    out.insert("greeting".into(), json!(greeting));
                    out.insert("language".into(), json!(language));
                    out.insert("timestamp".into(), json!(PROCESSED_AT));
                    Ok(("supported_language".to_string(), out))
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    registry
        .register(
            AgentDefinition::builder("formatter")
                .input_field(FieldSpec::required("greeting", FieldType::String))
                .output_field(FieldSpec::required("formatted_message", FieldType::String))
                .output_field(FieldSpec::required("metadata", FieldType::Map))
                .outcome("complete", RoutingRule::Terminal)
                .handler(|input| {
                    let greeting = input["greeting"].as_str().unwrap_or_default();
                    let mut out = DataMap::new();
                    out.insert("formatted_message".into(), json!(greeting.to_uppercase()));
                    out.insert(
                        "metadata".into(),
                        json!({"processed_at": PROCESSED_AT, "formatter": "upper"}),
                    );
                    Ok(("complete".to_string(), out))
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    registry
        .register(
            AgentDefinition::builder("fallback")
                .input_field(FieldSpec::required(
                    "unsupported_language",
                    FieldType::String,
                ))
                .outcome("unsupported_language", RoutingRule::Terminal)
                .handler(|input| Ok(("unsupported_language".to_string(), input)))
                .build()
                .unwrap(),
        )
        .unwrap();

    registry
}

// ============================================================================
// GREETER TESTS - static Forward routing
// ============================================================================

#[tokio::test]
async fn greeter_supported_language_reaches_formatter() {
    let supervisor = Supervisor::new(greeter_registry());

    let result = supervisor
        .process("greeter", data(json!({"language": "es", "name": "Maria"})))
        .await
        .unwrap();

    assert_eq!(result.outcome, "complete");
    assert_eq!(result.data["formatted_message"], json!("¡HOLA MARIA"));
    assert_eq!(
        result.data["metadata"]["processed_at"],
        json!(PROCESSED_AT)
    );
    assert!(result.data[PIPELINE_ID_KEY].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn greeter_unsupported_language_reaches_fallback() {
    let supervisor = Supervisor::new(greeter_registry());

    let result = supervisor
        .process("greeter", data(json!({"language": "de", "name": "Hans"})))
        .await
        .unwrap();

    assert_eq!(result.outcome, "unsupported_language");
    assert_eq!(result.data["unsupported_language"], json!("de"));
    assert!(result.data.contains_key(PIPELINE_ID_KEY));
}

#[tokio::test]
async fn greeter_default_language_is_english() {
    let supervisor = Supervisor::new(greeter_registry());

    let result = supervisor
        .process("greeter", data(json!({"name": "Ada"})))
        .await
        .unwrap();

    assert_eq!(result.data["formatted_message"], json!("HELLO ADA"));
}

#[tokio::test]
async fn greeter_missing_name_is_a_validation_error() {
    let supervisor = Supervisor::new(greeter_registry());

    let result = supervisor
        .process("greeter", data(json!({"language": "en"})))
        .await;

    assert!(matches!(result, Err(PipelineError::Validation { .. })));
}

// ============================================================================
// RETRY TESTS - bounded self-loops with backoff
// ============================================================================

fn flaky_registry(max_attempts: u32) -> AgentRegistry {
    let registry = AgentRegistry::new();
    registry
        .register(
            AgentDefinition::builder("flaky")
                .outcome(
                    "retry",
                    RoutingRule::Retry {
                        max_attempts: Some(max_attempts),
                    },
                )
                .outcome("success", RoutingRule::Terminal)
                .handler(|mut input| {
                    // Succeed on the third invocation (attempts 0 and 1 retry).
                    if retry_attempt(&input) < 2 {
                        Ok(("retry".to_string(), input))
                    } else {
                        input.insert("recovered".into(), json!(true));
                        Ok(("success".to_string(), input))
                    }
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
}

#[tokio::test(start_paused = true)]
async fn retry_with_exponential_backoff_then_success() {
    // Default config: exponential backoff, base 1000 ms, 3 attempts.
    let supervisor = Supervisor::new(flaky_registry(3));

    let started = tokio::time::Instant::now();
    let result = supervisor.process("flaky", DataMap::new()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(result.outcome, "success");
    assert_eq!(result.data["recovered"], json!(true));
    assert_eq!(result.data[RETRY_ATTEMPT_KEY], json!(2));
    // 1000 ms before the first rerun, 2000 ms before the second.
    assert_eq!(elapsed, Duration::from_millis(3000));
}

#[tokio::test]
async fn retry_exhaustion_reports_the_bound() {
    let registry = AgentRegistry::new();
    registry
        .register(
            AgentDefinition::builder("hopeless")
                .outcome(
                    "retry",
                    RoutingRule::Retry {
                        max_attempts: Some(2),
                    },
                )
                .handler(|input| Ok(("retry".to_string(), input)))
                .build()
                .unwrap(),
        )
        .unwrap();

    let supervisor = Supervisor::new(registry).with_config(relay::EngineConfig {
        retry_base_ms: 1,
        ..Default::default()
    });

    let result = supervisor.process("hopeless", DataMap::new()).await;
    match result {
        Err(err) => assert_eq!(err.to_string(), "Max retry attempts (2) exceeded"),
        Ok(outcome) => panic!("expected exhaustion, got {:?}", outcome.outcome),
    }
}

// ============================================================================
// CONCURRENCY TESTS - isolation across parallel pipelines
// ============================================================================

#[tokio::test]
async fn five_parallel_pipelines_do_not_contaminate_each_other() {
    let registry = AgentRegistry::new();
    registry
        .register(
            AgentDefinition::builder("echo")
                .input_field(FieldSpec::required("name", FieldType::String))
                .outcome("done", RoutingRule::Terminal)
                .handler(|input| {
                    let name = input["name"].as_str().unwrap_or_default();
                    let mut out = DataMap::new();
                    out.insert("message".into(), json!(format!("hello {name}")));
                    Ok(("done".to_string(), out))
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    let supervisor = Supervisor::new(registry);

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let supervisor = supervisor.clone();
            tokio::spawn(async move {
                supervisor
                    .process("echo", data(json!({"name": format!("user-{i}")})))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut ids = Vec::new();
    let mut messages = Vec::new();
    for handle in handles {
        let result = handle.await.unwrap();
        ids.push(result.data[PIPELINE_ID_KEY].as_u64().unwrap());
        messages.push(result.data["message"].as_str().unwrap().to_string());
    }

    let total = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), total, "pipeline ids are pairwise distinct");

    messages.sort();
    messages.dedup();
    assert_eq!(messages.len(), total, "messages are pairwise distinct");
}

// ============================================================================
// ROUTING TESTS - LLM override precedence
// ============================================================================

/// Moderation pipeline: the handler always says pass, the model may disagree.
fn moderation_registry() -> AgentRegistry {
    let registry = AgentRegistry::new();

    registry
        .register(
            AgentDefinition::builder("moderator")
                .input_field(FieldSpec::required("comment", FieldType::String))
                .outcome_described(
                    "filter",
                    RoutingRule::forward("filter_agent"),
                    "Content needs cleanup before publishing",
                )
                .outcome_described("pass", RoutingRule::Terminal, "Content is acceptable")
                .outcome_described("retry", RoutingRule::retry(2), "Transient failure")
                .outcome_described("error", RoutingRule::Terminal, "Unrecoverable")
                .handler(|input| Ok(("pass".to_string(), input)))
                .llm_routing(LlmRouting::new("Decide how to treat this comment."))
                .build()
                .unwrap(),
        )
        .unwrap();

    registry
        .register(
            AgentDefinition::builder("filter_agent")
                .output_field(FieldSpec::required("filtered", FieldType::Boolean))
                .outcome("filtered", RoutingRule::Terminal)
                .handler(|mut input| {
                    input.insert("filtered".into(), json!(true));
                    Ok(("filtered".to_string(), input))
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    registry
}

#[tokio::test]
async fn llm_decision_reroutes_and_reasoning_travels_downstream() {
    let client = MockClient::with_decision("filter", "R");
    let supervisor = Supervisor::new(moderation_registry()).with_client(client);

    let result = supervisor
        .process("moderator", data(json!({"comment": "buy cheap pills"})))
        .await
        .unwrap();

    // The model's choice won over the handler's "pass".
    assert_eq!(result.outcome, "filtered");
    assert_eq!(result.data["filtered"], json!(true));
    assert_eq!(result.data[LLM_REASONING_KEY], json!("R"));
}

#[tokio::test]
async fn invalid_llm_outcome_falls_back_to_handler_choice() {
    let client = MockClient::with_decision("banned", "not declared");
    let supervisor = Supervisor::new(moderation_registry()).with_client(client);

    let result = supervisor
        .process("moderator", data(json!({"comment": "all good"})))
        .await
        .unwrap();

    // Router error is non-fatal: the handler's "pass" outcome applies.
    assert_eq!(result.outcome, "pass");
    assert!(!result.data.contains_key(LLM_REASONING_KEY));
}

#[tokio::test]
async fn transport_failure_falls_back_to_handler_choice() {
    let client = Arc::new(MockClient::with_replies(vec![relay::MockReply::Error(
        "connection refused".into(),
    )]));
    let supervisor = Supervisor::new(moderation_registry()).with_client(client);

    let result = supervisor
        .process("moderator", data(json!({"comment": "all good"})))
        .await
        .unwrap();

    assert_eq!(result.outcome, "pass");
}

// ============================================================================
// CONTEXT TESTS - id propagation through multi-hop pipelines
// ============================================================================

#[tokio::test]
async fn pipeline_id_propagates_through_every_hop() {
    let supervisor = Supervisor::new(greeter_registry());

    let result = supervisor
        .process("greeter", data(json!({"language": "fr", "name": "Zoe"})))
        .await
        .unwrap();
    let id = result.data[PIPELINE_ID_KEY].as_u64().unwrap();

    // Every event the run emitted is attributed to that id.
    let events = supervisor.event_log().filter_pipeline(id);
    assert!(events.len() >= 4, "expected a full lifecycle of events");
}

#[tokio::test]
async fn caller_supplied_pipeline_id_is_preserved() {
    let supervisor = Supervisor::new(greeter_registry());

    let mut input = data(json!({"language": "en", "name": "Ada"}));
    input.insert(PIPELINE_ID_KEY.to_string(), json!(12345));

    let result = supervisor.process("greeter", input).await.unwrap();
    assert_eq!(result.data[PIPELINE_ID_KEY], json!(12345));
}
