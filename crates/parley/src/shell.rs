// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley shell` command implementation.
//!
//! Launches an interactive REPL with colored prompt, streaming output, and
//! readline history. Every line continues the same conversation.

use std::io::Write;

use colored::Colorize;
use futures::StreamExt;
use parley_config::ParleyConfig;
use parley_core::{ConversationId, ParleyError, UserId};
use parley_engine::{ChatRequest, ChatService, StreamFragment};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

/// Runs the `parley shell` interactive REPL.
pub async fn run_shell(
    config: ParleyConfig,
    user: UserId,
    conversation: Option<ConversationId>,
) -> Result<(), ParleyError> {
    let service = parley::build_service(config).await?;
    let mut conversation = conversation;

    let mut rl = DefaultEditor::new()
        .map_err(|e| ParleyError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", "parley shell".bold().green());
    println!("Type {} to exit.\n", "/quit".yellow());

    let prompt = format!("{}> ", "parley".green());
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed == "/quit" || trimmed == "/exit" {
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                let mut request = ChatRequest::new(user.clone(), trimmed);
                request.conversation_id = conversation.clone();
                match stream_turn(&service, request).await {
                    Ok(id) => conversation = Some(id),
                    Err(e) => eprintln!("{}: {e}", "error".red()),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }

    if let Some(id) = &conversation {
        println!("{}", format!("conversation {id}").dimmed());
    }
    service.backends().shutdown().await;
    service.store().shutdown().await?;
    Ok(())
}

/// Streams one reply to stdout and returns the conversation it landed in.
async fn stream_turn(
    service: &ChatService,
    request: ChatRequest,
) -> Result<ConversationId, ParleyError> {
    let mut fragments = service.submit_stream(request);
    let mut stdout = std::io::stdout();
    let mut conversation = None;

    while let Some(fragment) = fragments.next().await {
        match fragment {
            StreamFragment::Started { conversation_id } => {
                debug!(conversation_id = %conversation_id, "turn started");
                conversation = Some(conversation_id);
            }
            StreamFragment::Text { text } => {
                print!("{text}");
                let _ = stdout.flush();
            }
            StreamFragment::Restart { backend } => {
                println!();
                println!("{}", format!("[restarting on {backend}]").yellow());
            }
            StreamFragment::Done { .. } => println!(),
            StreamFragment::Error { kind, message, .. } => {
                println!();
                eprintln!("{}: {message} ({kind})", "error".red());
            }
        }
    }

    conversation.ok_or_else(|| ParleyError::Internal("turn did not start".into()))
}
