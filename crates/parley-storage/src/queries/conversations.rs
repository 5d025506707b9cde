// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation and message queries.
//!
//! Timestamps are stored as RFC 3339 text with microsecond precision.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use parley_core::{
    Conversation, ConversationId, Message, ParleyError, Role, StoreConflict, UserId,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};

/// Header row of a stored conversation.
struct ConversationRow {
    id: ConversationId,
    user_id: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn conversation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    let created: String = row.get(2)?;
    let updated: String = row.get(3)?;
    Ok(ConversationRow {
        id: ConversationId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        created_at: parse_ts(2, &created)?,
        updated_at: parse_ts(3, &updated)?,
    })
}

fn message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let role: String = row.get(0)?;
    let content: String = row.get(1)?;
    let created: String = row.get(2)?;
    let role = Role::from_str(&role)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    Message::at(role, content, parse_ts(2, &created)?)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))
}

fn load_messages(conn: &Connection, id: &ConversationId) -> rusqlite::Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT role, content, created_at FROM messages
         WHERE conversation_id = ?1 ORDER BY sequence ASC",
    )?;
    let rows = stmt.query_map(params![id.as_str()], message_row)?;
    rows.collect()
}

fn hydrate(conn: &Connection, header: ConversationRow) -> Result<Conversation, ParleyError> {
    let messages = load_messages(conn, &header.id).map_err(ParleyError::store)?;
    Conversation::restore(
        header.id,
        header.user_id,
        messages,
        header.created_at,
        header.updated_at,
    )
}

/// Loads one conversation with its messages in insertion order.
pub fn find_by_id(
    conn: &Connection,
    id: &ConversationId,
) -> Result<Option<Conversation>, ParleyError> {
    let header = conn
        .query_row(
            "SELECT id, user_id, created_at, updated_at FROM conversations WHERE id = ?1",
            params![id.as_str()],
            conversation_row,
        )
        .optional()
        .map_err(ParleyError::store)?;
    header.map(|h| hydrate(conn, h)).transpose()
}

/// Lists a user's conversations, most recently updated first.
pub fn find_by_user(conn: &Connection, user_id: &UserId) -> Result<Vec<Conversation>, ParleyError> {
    let headers = {
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, created_at, updated_at FROM conversations
                 WHERE user_id = ?1 ORDER BY updated_at DESC, id ASC",
            )
            .map_err(ParleyError::store)?;
        let rows = stmt
            .query_map(params![user_id.as_str()], conversation_row)
            .map_err(ParleyError::store)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(ParleyError::store)?
    };
    headers.into_iter().map(|h| hydrate(conn, h)).collect()
}

/// Upserts the header and appends messages not yet stored, in one transaction.
///
/// `new_id` is used when the conversation has no identifier. The stored
/// messages must be a prefix of the snapshot; anything else means another
/// writer appended since the snapshot was loaded, and the save is rejected
/// with [`StoreConflict::StaleSnapshot`]. Moving a conversation to another
/// user is rejected too.
pub fn save(
    conn: &mut Connection,
    conversation: &Conversation,
    new_id: ConversationId,
    now: DateTime<Utc>,
) -> Result<Conversation, ParleyError> {
    let id = conversation.id().cloned().unwrap_or(new_id);
    let mut updated_at = conversation.updated_at().max(now);
    let tx = conn.transaction().map_err(ParleyError::store)?;

    let existing: Option<(String, String)> = tx
        .query_row(
            "SELECT user_id, created_at FROM conversations WHERE id = ?1",
            params![id.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(ParleyError::store)?;

    let created_at = match &existing {
        Some((owner, created)) => {
            if owner != conversation.user_id().as_str() {
                return Err(ParleyError::store(StoreConflict::OwnerChanged { id }));
            }
            parse_ts(1, created).map_err(ParleyError::store)?
        }
        None => conversation.created_at(),
    };
    updated_at = updated_at.max(created_at);

    let stored = load_messages(&tx, &id).map_err(ParleyError::store)?;
    if !is_prefix(&stored, conversation.messages()) {
        return Err(ParleyError::store(StoreConflict::StaleSnapshot {
            id,
            stored: stored.len(),
            incoming: conversation.messages().len(),
        }));
    }
    let stored = stored.len();

    tx.execute(
        "INSERT INTO conversations (id, user_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at",
        params![
            id.as_str(),
            conversation.user_id().as_str(),
            format_ts(created_at),
            format_ts(updated_at),
        ],
    )
    .map_err(ParleyError::store)?;

    {
        let mut insert = tx
            .prepare(
                "INSERT INTO messages (conversation_id, sequence, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(ParleyError::store)?;
        for (sequence, message) in conversation.messages().iter().enumerate().skip(stored) {
            insert
                .execute(params![
                    id.as_str(),
                    sequence as i64,
                    message.role().to_string(),
                    message.content(),
                    format_ts(message.timestamp()),
                ])
                .map_err(ParleyError::store)?;
        }
    }

    tx.commit().map_err(ParleyError::store)?;

    Conversation::restore(
        id,
        conversation.user_id().clone(),
        conversation.messages().to_vec(),
        created_at,
        updated_at,
    )
}

/// Compares at the precision timestamps are stored with.
fn same_message(stored: &Message, incoming: &Message) -> bool {
    stored.role() == incoming.role()
        && stored.content() == incoming.content()
        && format_ts(stored.timestamp()) == format_ts(incoming.timestamp())
}

fn is_prefix(stored: &[Message], incoming: &[Message]) -> bool {
    stored.len() <= incoming.len()
        && stored.iter().zip(incoming).all(|(s, i)| same_message(s, i))
}

/// Deletes a conversation and its messages. Returns whether a row existed.
pub fn delete(conn: &mut Connection, id: &ConversationId) -> Result<bool, ParleyError> {
    let tx = conn.transaction().map_err(ParleyError::store)?;
    tx.execute(
        "DELETE FROM messages WHERE conversation_id = ?1",
        params![id.as_str()],
    )
    .map_err(ParleyError::store)?;
    let removed = tx
        .execute("DELETE FROM conversations WHERE id = ?1", params![id.as_str()])
        .map_err(ParleyError::store)?;
    tx.commit().map_err(ParleyError::store)?;
    Ok(removed > 0)
}
