// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests over the assembled service: config text in, stored
//! conversations out.

use futures::StreamExt;
use parley_core::{BackendId, ConversationStore, Role, UserId};
use parley_engine::{ChatRequest, StreamFragment, TRUNCATION_NOTICE};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn service_from(toml: &str) -> parley_engine::ChatService {
    let config = parley_config::load_and_validate_str(toml).expect("valid config");
    parley::build_service(config).await.expect("service builds")
}

const ECHO_ONLY: &str = r#"
[generation]
primary = "echo"
simulated_chunk_delay_ms = 0

[[backends]]
id = "echo"
kind = "echo"

[storage]
backend = "memory"
"#;

#[tokio::test]
async fn hello_then_follow_up_yields_four_ordered_messages() {
    let service = service_from(ECHO_ONLY).await;

    let first = service
        .submit(ChatRequest::new("alice", "Hello"))
        .await
        .unwrap();
    assert!(!first.text.trim().is_empty());

    let second = service
        .submit(ChatRequest::new("alice", "Follow up").in_conversation(first.conversation_id.clone()))
        .await
        .unwrap();
    assert_eq!(second.conversation_id, first.conversation_id);

    let stored = service
        .store()
        .find_by_id(&first.conversation_id)
        .await
        .unwrap()
        .unwrap();
    let turns: Vec<(Role, &str)> = stored
        .messages()
        .iter()
        .map(|m| (m.role(), m.content()))
        .collect();
    assert_eq!(
        turns,
        vec![
            (Role::User, "Hello"),
            (Role::Assistant, "Echo: Hello"),
            (Role::User, "Follow up"),
            (Role::Assistant, "Echo: Follow up"),
        ]
    );
}

#[tokio::test]
async fn streamed_turns_persist_to_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("parley.db");
    let toml = format!(
        r#"
[generation]
primary = "echo"

[[backends]]
id = "echo"
kind = "echo"

[storage]
backend = "sqlite"
database_path = "{}"
"#,
        db.display()
    );
    let service = service_from(&toml).await;

    let fragments: Vec<StreamFragment> = service
        .submit_stream(ChatRequest::new("alice", "Hello"))
        .collect()
        .await;
    let Some(StreamFragment::Done { conversation_id, .. }) = fragments.last() else {
        panic!("expected Done, got {fragments:?}");
    };

    let conversations = service.conversations(&UserId::from("alice")).await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].id(), Some(conversation_id));
    assert_eq!(conversations[0].messages()[1].content(), "Echo: Hello");
}

#[tokio::test]
async fn failing_primary_falls_back_and_is_recorded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let toml = format!(
        r#"
[generation]
primary = "remote"
fallbacks = ["echo"]

[[backends]]
id = "remote"
kind = "openai"
model = "gpt-4o-mini"
base_url = "{}"

[[backends]]
id = "echo"
kind = "echo"

[storage]
backend = "memory"
"#,
        server.uri()
    );
    let service = service_from(&toml).await;

    let reply = service
        .submit(ChatRequest::new("alice", "Hello"))
        .await
        .unwrap();
    assert_eq!(reply.backend, BackendId::from("echo"));
    assert_eq!(
        service.tracker().failed_backends(),
        vec![BackendId::from("remote")]
    );

    // Within the cooldown the failed primary is skipped entirely.
    let chain = service.chain_for(None);
    assert_eq!(chain.candidates(), [BackendId::from("echo")].as_slice());
}

#[tokio::test]
async fn long_reply_is_truncated_to_the_limit() {
    let toml = ECHO_ONLY.replace(
        "simulated_chunk_delay_ms = 0",
        "simulated_chunk_delay_ms = 0\nmax_response_chars = 10",
    );
    let service = service_from(&toml).await;

    let reply = service
        .submit(ChatRequest::new("alice", "a message that is far too long"))
        .await
        .unwrap();
    assert!(reply.truncated);

    let stored = service
        .store()
        .find_by_id(&reply.conversation_id)
        .await
        .unwrap()
        .unwrap();
    let persisted = stored.messages()[1].content();
    let core = persisted
        .strip_suffix(TRUNCATION_NOTICE)
        .expect("truncation notice present");
    assert_eq!(core.chars().count(), 10);
    assert_eq!(core, "Echo: a me");
}
