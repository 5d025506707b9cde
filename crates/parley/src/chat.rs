// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley chat` command implementation.

use std::io::Write;

use colored::Colorize;
use futures::StreamExt;
use parley_config::ParleyConfig;
use parley_core::{BackendId, ConversationId, ParleyError, UserId};
use parley_engine::{ChatRequest, ChatService, StreamFragment};

/// Parsed `chat` arguments.
pub struct ChatOptions {
    pub user: UserId,
    pub conversation: Option<ConversationId>,
    pub backend: Option<BackendId>,
    pub message: String,
    pub stream: bool,
    pub json: bool,
}

/// Runs one turn and prints the reply to stdout.
pub async fn run_chat(config: ParleyConfig, options: ChatOptions) -> Result<(), ParleyError> {
    let service = parley::build_service(config).await?;
    let request = ChatRequest {
        user_id: options.user,
        conversation_id: options.conversation,
        message: options.message,
        backend: options.backend,
    };

    let result = if options.stream {
        print_stream(&service, request, options.json).await
    } else {
        print_reply(&service, request, options.json).await
    };
    service.backends().shutdown().await;
    result
}

async fn print_reply(
    service: &ChatService,
    request: ChatRequest,
    json: bool,
) -> Result<(), ParleyError> {
    let reply = service.submit(request).await?;
    if json {
        let line = serde_json::to_string(&reply)
            .map_err(|e| ParleyError::Internal(format!("failed to encode reply: {e}")))?;
        println!("{line}");
    } else {
        println!("{}", reply.text);
        eprintln!(
            "{}",
            format!(
                "conversation {} via {}",
                reply.conversation_id, reply.backend
            )
            .dimmed()
        );
    }
    Ok(())
}

/// Prints fragments as they arrive. Returns an error if the stream ended in one.
pub async fn print_stream(
    service: &ChatService,
    request: ChatRequest,
    json: bool,
) -> Result<(), ParleyError> {
    let mut fragments = service.submit_stream(request);
    let mut stdout = std::io::stdout();
    let mut failure = None;

    while let Some(fragment) = fragments.next().await {
        if json {
            let line = serde_json::to_string(&fragment)
                .map_err(|e| ParleyError::Internal(format!("failed to encode fragment: {e}")))?;
            println!("{line}");
        } else {
            match &fragment {
                StreamFragment::Started { .. } => {}
                StreamFragment::Text { text } => {
                    print!("{text}");
                    let _ = stdout.flush();
                }
                StreamFragment::Restart { backend } => {
                    println!();
                    eprintln!("{}", format!("[restarting on {backend}]").yellow());
                }
                StreamFragment::Done {
                    conversation_id,
                    backend,
                    ..
                } => {
                    println!();
                    eprintln!(
                        "{}",
                        format!("conversation {conversation_id} via {backend}").dimmed()
                    );
                }
                StreamFragment::Error { .. } => println!(),
            }
        }
        if let StreamFragment::Error { kind, message, .. } = fragment {
            failure = Some(ParleyError::Internal(format!("{kind}: {message}")));
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
