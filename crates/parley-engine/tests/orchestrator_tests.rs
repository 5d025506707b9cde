// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Orchestrator behavior against scripted backends.

use std::sync::Arc;
use std::time::Duration;

use parley_core::{BackendId, ParleyError};
use parley_engine::{
    BackendRegistry, OrchestratorSettings, StreamOutcome, StreamingOrchestrator,
    TRUNCATION_NOTICE,
};
use parley_resilience::{ProviderStateTracker, build_fallback_chain};
use parley_test_utils::{
    GenerateBehavior, RecordingSink, ScriptedBackend, SinkEvent, StreamBehavior,
};

const COOLDOWN: Duration = Duration::from_secs(60);

fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        max_response_chars: 1_000,
        simulated_chunk_chars: 4,
        simulated_chunk_delay: Duration::ZERO,
        stream_idle_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(10),
    }
}

fn orchestrator(
    backends: &[Arc<ScriptedBackend>],
    settings: OrchestratorSettings,
) -> StreamingOrchestrator {
    let mut registry = BackendRegistry::new();
    for backend in backends {
        registry.register(backend.clone());
    }
    StreamingOrchestrator::new(registry, Arc::new(ProviderStateTracker::new()), settings)
}

fn ids(names: &[&str]) -> Vec<BackendId> {
    names.iter().map(|n| BackendId::from(*n)).collect()
}

fn chain(orch: &StreamingOrchestrator, names: &[&str]) -> parley_resilience::FallbackChain {
    let ids = ids(names);
    build_fallback_chain(&ids[0], &ids[1..], COOLDOWN, orch.tracker())
}

fn chunks(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

#[tokio::test]
async fn native_stream_is_forwarded_chunk_by_chunk() {
    let primary = ScriptedBackend::replying("primary", "Hello there friend").into_arc();
    let orch = orchestrator(&[primary.clone()], settings());
    let mut sink = RecordingSink::new();

    let outcome = orch
        .stream(chain(&orch, &["primary"]), "hi", &mut sink)
        .await
        .unwrap();

    let StreamOutcome::Succeeded(session) = outcome else {
        panic!("expected success");
    };
    assert_eq!(sink.chunks(), vec!["Hello ", "there ", "friend"]);
    assert_eq!(session.text(), "Hello there friend");
    assert_eq!(session.backend(), Some(&BackendId::from("primary")));
    assert_eq!(primary.stream_calls(), 1);
    assert_eq!(primary.generate_calls(), 0);
}

#[tokio::test]
async fn empty_stream_falls_back_to_simulated_on_same_backend() {
    let primary = ScriptedBackend::replying("primary", "abcdefghij")
        .then_stream(StreamBehavior::Empty)
        .into_arc();
    let secondary = ScriptedBackend::replying("secondary", "unused").into_arc();
    let orch = orchestrator(&[primary.clone(), secondary.clone()], settings());
    let mut sink = RecordingSink::new();

    let outcome = orch
        .stream(chain(&orch, &["primary", "secondary"]), "hi", &mut sink)
        .await
        .unwrap();

    let StreamOutcome::Succeeded(session) = outcome else {
        panic!("expected success");
    };
    assert_eq!(sink.chunks(), vec!["abcd", "efgh", "ij"]);
    assert_eq!(session.backend(), Some(&BackendId::from("primary")));
    assert_eq!(primary.generate_calls(), 1);
    assert_eq!(secondary.calls(), 0);
    // Recovered on the simulated path, so the failure mark is cleared.
    assert!(orch.tracker().last_failure(&BackendId::from("primary")).is_none());
}

#[tokio::test]
async fn whitespace_only_stream_counts_as_empty() {
    let primary = ScriptedBackend::replying("primary", "real answer")
        .then_stream(StreamBehavior::Chunks(chunks(&["  ", "\n"])))
        .into_arc();
    let orch = orchestrator(&[primary.clone()], settings());
    let mut sink = RecordingSink::new();

    orch.stream(chain(&orch, &["primary"]), "hi", &mut sink)
        .await
        .unwrap();

    assert!(matches!(sink.events()[2], SinkEvent::Restart(_)));
    assert_eq!(sink.visible_text(), "real answer");
}

#[tokio::test]
async fn mid_stream_failure_restarts_before_simulated_attempt() {
    let primary = ScriptedBackend::replying("primary", "complete reply")
        .then_stream(StreamBehavior::FailAfter(chunks(&["partial "]), "reset".into()))
        .into_arc();
    let orch = orchestrator(&[primary.clone()], settings());
    let mut sink = RecordingSink::new();

    let outcome = orch
        .stream(chain(&orch, &["primary"]), "hi", &mut sink)
        .await
        .unwrap();

    assert_eq!(
        sink.events()[..2],
        [
            SinkEvent::Chunk("partial ".into()),
            SinkEvent::Restart(BackendId::from("primary")),
        ]
    );
    assert_eq!(sink.visible_text(), "complete reply");
    let StreamOutcome::Succeeded(session) = outcome else {
        panic!("expected success");
    };
    assert_eq!(session.text(), "complete reply");
}

#[tokio::test]
async fn falls_through_to_next_backend_and_marks_failure() {
    let primary = ScriptedBackend::failing("primary").into_arc();
    let secondary = ScriptedBackend::replying("secondary", "from secondary").into_arc();
    let orch = orchestrator(&[primary.clone(), secondary.clone()], settings());
    let mut sink = RecordingSink::new();

    let outcome = orch
        .stream(chain(&orch, &["primary", "secondary"]), "hi", &mut sink)
        .await
        .unwrap();

    let StreamOutcome::Succeeded(session) = outcome else {
        panic!("expected success");
    };
    assert_eq!(session.backend(), Some(&BackendId::from("secondary")));
    assert_eq!(primary.stream_calls(), 1);
    assert_eq!(primary.generate_calls(), 1);
    assert!(orch.tracker().last_failure(&BackendId::from("primary")).is_some());
    assert!(!orch.tracker().is_available(&BackendId::from("primary"), COOLDOWN));
}

#[tokio::test]
async fn exhausted_chain_lists_each_backend_once() {
    let a = ScriptedBackend::failing("a").into_arc();
    let b = ScriptedBackend::failing("b")
        .otherwise_stream(StreamBehavior::Empty)
        .otherwise_generate(GenerateBehavior::Empty)
        .into_arc();
    let orch = orchestrator(&[a, b], settings());
    let mut sink = RecordingSink::new();

    let err = orch
        .stream(chain(&orch, &["a", "b", "a", "ghost"]), "hi", &mut sink)
        .await
        .unwrap_err();

    let ParleyError::AllBackendsFailed { attempts } = &err else {
        panic!("expected AllBackendsFailed, got {err}");
    };
    let attempted: Vec<&str> = attempts.iter().map(|f| f.backend.as_str()).collect();
    assert_eq!(attempted, vec!["a", "b", "ghost"]);
    assert_eq!(attempts[0].errors.len(), 2);
    assert!(matches!(attempts[1].errors[0], ParleyError::EmptyStream));
    assert!(matches!(
        attempts[2].errors[0],
        ParleyError::BackendNotRegistered(_)
    ));
    assert!(sink.events().is_empty());
    assert_eq!(err.kind(), "all_backends_failed");
}

#[tokio::test]
async fn cooling_down_primary_is_still_tried_when_alone() {
    let primary = ScriptedBackend::replying("primary", "back again").into_arc();
    let orch = orchestrator(&[primary.clone()], settings());
    orch.tracker().mark_failed(&BackendId::from("primary"));

    let built = chain(&orch, &["primary"]);
    assert_eq!(built.candidates(), ids(&["primary"]).as_slice());

    let mut sink = RecordingSink::new();
    orch.stream(built, "hi", &mut sink).await.unwrap();
    assert_eq!(primary.stream_calls(), 1);
    assert!(orch.tracker().is_available(&BackendId::from("primary"), COOLDOWN));
}

#[tokio::test]
async fn truncation_stops_pulling_and_bounds_text() {
    let long = ScriptedBackend::failing("long")
        .otherwise_stream(StreamBehavior::Chunks(chunks(&["aaaa", "bbbb", "cccc"])))
        .into_arc();
    let orch = orchestrator(
        &[long],
        OrchestratorSettings {
            max_response_chars: 6,
            ..settings()
        },
    );
    let mut sink = RecordingSink::new();

    let outcome = orch
        .stream(chain(&orch, &["long"]), "hi", &mut sink)
        .await
        .unwrap();

    let StreamOutcome::Succeeded(session) = outcome else {
        panic!("expected success");
    };
    assert_eq!(sink.chunks(), vec!["aaaa", "bb"]);
    assert!(session.is_truncated());
    assert_eq!(session.text().chars().count(), 6);
    assert_eq!(session.final_text(), format!("aaaabb{TRUNCATION_NOTICE}"));
}

#[tokio::test]
async fn disconnect_stops_generation_and_keeps_partial() {
    let primary = ScriptedBackend::failing("primary")
        .otherwise_stream(StreamBehavior::Chunks(chunks(&["one ", "two ", "three"])))
        .into_arc();
    let orch = orchestrator(&[primary.clone()], settings());
    let mut sink = RecordingSink::disconnecting_after(2);

    let outcome = orch
        .stream(chain(&orch, &["primary"]), "hi", &mut sink)
        .await
        .unwrap();

    let StreamOutcome::Cancelled(session) = outcome else {
        panic!("expected cancellation");
    };
    assert_eq!(session.text(), "one two ");
    assert_eq!(primary.generate_calls(), 0);
    assert!(orch.tracker().failed_backends().is_empty());
}

#[tokio::test(start_paused = true)]
async fn idle_stream_times_out_into_simulated_path() {
    let primary = ScriptedBackend::replying("primary", "late but whole")
        .then_stream(StreamBehavior::Hang)
        .into_arc();
    let orch = orchestrator(&[primary.clone()], settings());
    let mut sink = RecordingSink::new();

    let outcome = orch
        .stream(chain(&orch, &["primary"]), "hi", &mut sink)
        .await
        .unwrap();

    assert!(matches!(outcome, StreamOutcome::Succeeded(_)));
    assert_eq!(sink.visible_text(), "late but whole");
    assert_eq!(primary.generate_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn hanging_single_shot_times_out() {
    let primary = ScriptedBackend::failing("primary")
        .otherwise_generate(GenerateBehavior::Hang)
        .into_arc();
    let orch = orchestrator(&[primary], settings());

    let err = orch
        .generate(chain(&orch, &["primary"]), "hi")
        .await
        .unwrap_err();
    let ParleyError::AllBackendsFailed { attempts } = err else {
        panic!("expected AllBackendsFailed");
    };
    assert!(matches!(attempts[0].errors[0], ParleyError::Timeout { .. }));
}

#[tokio::test]
async fn single_shot_walks_chain_and_bounds_text() {
    let primary = ScriptedBackend::failing("primary").into_arc();
    let secondary = ScriptedBackend::replying("secondary", "0123456789").into_arc();
    let orch = orchestrator(
        &[primary.clone(), secondary.clone()],
        OrchestratorSettings {
            max_response_chars: 4,
            ..settings()
        },
    );

    let session = orch
        .generate(chain(&orch, &["primary", "secondary"]), "hi")
        .await
        .unwrap();

    assert_eq!(session.backend(), Some(&BackendId::from("secondary")));
    assert_eq!(session.text(), "0123");
    assert!(session.is_truncated());
    assert_eq!(primary.stream_calls(), 0);
    assert_eq!(secondary.stream_calls(), 0);
}
