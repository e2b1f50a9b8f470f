// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Citation lookups. References are written only alongside a message,
//! see [`crate::queries::messages::create_conversation_message`].

use kbchat_core::{ConversationReference, KbchatError};
use rusqlite::Row;

use crate::database::Database;
use crate::filter::{Column, Filter};
use crate::queries::query_all;

const REFERENCE_SELECT: &str = "SELECT conversation_references.id,
        conversation_references.conversation_id, conversation_references.app_id,
        conversation_references.node_id, conversation_references.name,
        conversation_references.url
     FROM conversation_references";

fn row_to_reference(row: &Row<'_>) -> rusqlite::Result<ConversationReference> {
    Ok(ConversationReference {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        app_id: row.get(2)?,
        node_id: row.get(3)?,
        name: row.get(4)?,
        url: row.get(5)?,
    })
}

/// Every reference cited in a conversation, in the order they were stored.
pub async fn get_conversation_references(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<ConversationReference>, KbchatError> {
    let clause = Filter::new()
        .eq(Column::ReferenceConversationId, conversation_id.to_string())
        .render();
    db.call(move |conn| {
        query_all(
            conn,
            REFERENCE_SELECT,
            &clause,
            "ORDER BY conversation_references.rowid ASC",
            row_to_reference,
        )
    })
    .await
}
