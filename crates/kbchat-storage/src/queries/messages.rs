// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message writes and reads.

use kbchat_core::{ConversationMessage, ConversationReference, KbchatError};
use rusqlite::{Row, params};
use tracing::debug;

use crate::database::Database;
use crate::filter::{Column, Filter};
use crate::models::{encode_info, format_timestamp, info_column, role_column, timestamp_column};
use crate::queries::{query_all, query_optional};

pub(crate) const MESSAGE_SELECT: &str = "SELECT conversation_messages.id,
        conversation_messages.conversation_id, conversation_messages.app_id,
        conversation_messages.role, conversation_messages.content,
        conversation_messages.provider, conversation_messages.model,
        conversation_messages.prompt_tokens, conversation_messages.completion_tokens,
        conversation_messages.total_tokens, conversation_messages.remote_ip,
        conversation_messages.info, conversation_messages.created_at
     FROM conversation_messages";

/// Chronological order; insertion order breaks timestamp ties.
pub(crate) const MESSAGE_ORDER: &str =
    "ORDER BY conversation_messages.created_at ASC, conversation_messages.rowid ASC";

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<ConversationMessage> {
    Ok(ConversationMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        app_id: row.get(2)?,
        role: role_column(row, 3)?,
        content: row.get(4)?,
        provider: row.get(5)?,
        model: row.get(6)?,
        prompt_tokens: row.get(7)?,
        completion_tokens: row.get(8)?,
        total_tokens: row.get(9)?,
        remote_ip: row.get(10)?,
        info: info_column(row, 11)?,
        created_at: timestamp_column(row, 12)?,
    })
}

/// Insert a message and its references in one transaction.
///
/// Either the message and every reference are stored, or none of them are.
pub async fn create_conversation_message(
    db: &Database,
    message: &ConversationMessage,
    references: &[ConversationReference],
) -> Result<(), KbchatError> {
    let msg = message.clone();
    let refs = references.to_vec();
    let info = msg.info.as_ref().map(encode_info).transpose()?;

    let reference_count = db
        .transaction(move |tx| {
            tx.execute(
                "INSERT INTO conversation_messages (id, conversation_id, app_id, role, content,
                    provider, model, prompt_tokens, completion_tokens, total_tokens, remote_ip,
                    info, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    msg.id,
                    msg.conversation_id,
                    msg.app_id,
                    msg.role.to_string(),
                    msg.content,
                    msg.provider,
                    msg.model,
                    msg.prompt_tokens,
                    msg.completion_tokens,
                    msg.total_tokens,
                    msg.remote_ip,
                    info,
                    format_timestamp(&msg.created_at),
                ],
            )?;

            if !refs.is_empty() {
                let mut stmt = tx.prepare(
                    "INSERT INTO conversation_references (id, conversation_id, app_id, node_id, name, url)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for r in &refs {
                    stmt.execute(params![
                        r.id,
                        r.conversation_id,
                        r.app_id,
                        r.node_id,
                        r.name,
                        r.url
                    ])?;
                }
            }
            Ok(refs.len())
        })
        .await?;

    debug!(
        message_id = %message.id,
        conversation_id = %message.conversation_id,
        role = %message.role,
        references = reference_count,
        "message stored"
    );
    Ok(())
}

/// Every message of a conversation, oldest first.
///
/// An unknown conversation yields an empty list.
pub async fn get_conversation_messages(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<ConversationMessage>, KbchatError> {
    let clause = Filter::new()
        .eq(Column::MessageConversationId, conversation_id.to_string())
        .render();
    db.call(move |conn| query_all(conn, MESSAGE_SELECT, &clause, MESSAGE_ORDER, row_to_message))
        .await
}

pub async fn get_message_detail(
    db: &Database,
    message_id: &str,
) -> Result<ConversationMessage, KbchatError> {
    let clause = Filter::new()
        .eq(Column::MessageId, message_id.to_string())
        .render();
    db.call(move |conn| query_optional(conn, MESSAGE_SELECT, &clause, row_to_message))
        .await?
        .ok_or(KbchatError::NotFound { entity: "message" })
}
