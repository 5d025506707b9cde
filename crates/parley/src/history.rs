// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley history` command implementation.

use colored::Colorize;
use parley_config::ParleyConfig;
use parley_core::{ConversationId, ParleyError, Role, UserId};

/// Prints one conversation, or lists the user's conversations.
pub async fn run_history(
    config: ParleyConfig,
    user: UserId,
    id: Option<ConversationId>,
) -> Result<(), ParleyError> {
    let service = parley::build_service(config).await?;

    match id {
        Some(id) => {
            let conversation = service
                .conversation(&user, &id)
                .await?
                .ok_or(ParleyError::ConversationNotFound { id })?;
            for message in conversation.messages() {
                let label = match message.role() {
                    Role::User => "user".cyan(),
                    Role::Assistant => "assistant".green(),
                };
                let stamp = message.timestamp().format("%Y-%m-%d %H:%M:%S");
                println!("{} {label}: {}", stamp.to_string().dimmed(), message.content());
            }
        }
        None => {
            let conversations = service.conversations(&user).await?;
            if conversations.is_empty() {
                println!("{}", format!("no conversations for {user}").dimmed());
            }
            for conversation in conversations {
                let id = conversation
                    .id()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                let preview: String = conversation
                    .messages()
                    .first()
                    .map(|m| m.content().chars().take(60).collect())
                    .unwrap_or_default();
                println!(
                    "{id}  {}  {} messages  {preview}",
                    conversation.updated_at().format("%Y-%m-%d %H:%M"),
                    conversation.messages().len()
                );
            }
        }
    }

    service.store().shutdown().await
}
