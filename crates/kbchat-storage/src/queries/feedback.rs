// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message feedback updates and per-conversation feedback lookup.

use std::collections::HashMap;

use kbchat_core::{FeedbackInfo, FeedbackRequest, KbchatError, Role};
use rusqlite::params;
use rusqlite::types::Value;
use tracing::{debug, error, warn};

use crate::database::Database;
use crate::filter::{Column, Filter, Predicate};
use crate::models::{encode_info, info_column};
use crate::queries::messages::MESSAGE_ORDER;
use crate::queries::query_all;

/// Replace the feedback stored on a message. The last write wins.
///
/// An unknown message id updates nothing and is not an error.
pub async fn update_message_feedback(
    db: &Database,
    feedback: &FeedbackRequest,
) -> Result<(), KbchatError> {
    let message_id = feedback.message_id.clone();
    let info = encode_info(&feedback.to_info())?;

    let updated = db
        .call(move |conn| {
            conn.execute(
                "UPDATE conversation_messages SET info = ?1 WHERE id = ?2",
                params![info, message_id],
            )
        })
        .await?;

    if updated == 0 {
        warn!(message_id = %feedback.message_id, "feedback for unknown message ignored");
    } else {
        debug!(message_id = %feedback.message_id, score = feedback.score, "feedback updated");
    }
    Ok(())
}

/// The filter selecting assistant messages that carry a non-zero score.
pub fn scored_feedback_filter(conversation_ids: &[String]) -> Filter {
    let ids = conversation_ids
        .iter()
        .map(|id| Value::Text(id.clone()))
        .collect();
    Filter::new()
        .and(Predicate::InList(Column::MessageConversationId, ids))
        .eq(Column::MessageRole, Role::Assistant.to_string())
        .and(Predicate::NotNull(Column::MessageInfo))
        .and(Predicate::NotEquals(Column::MessageScore, Value::Integer(0)))
}

/// For each conversation, the feedback of its most recent assistant message
/// with a non-zero score.
///
/// Conversations without such a message are absent from the map. An empty
/// input returns an empty map without touching the store.
pub async fn get_feedback_by_conversation_ids(
    db: &Database,
    conversation_ids: &[String],
) -> Result<HashMap<String, FeedbackInfo>, KbchatError> {
    if conversation_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let clause = scored_feedback_filter(conversation_ids).render();
    let rows = db
        .call(move |conn| {
            query_all(
                conn,
                "SELECT conversation_messages.conversation_id, conversation_messages.info
                 FROM conversation_messages",
                &clause,
                MESSAGE_ORDER,
                |row| Ok((row.get::<_, String>(0)?, info_column(row, 1)?)),
            )
        })
        .await
        .inspect_err(|e| error!(error = %e, "failed to load conversation feedback"))?;

    // Rows come oldest first, so later inserts overwrite earlier ones.
    let mut feedback = HashMap::with_capacity(rows.len());
    for (conversation_id, info) in rows {
        if let Some(info) = info {
            feedback.insert(conversation_id, info);
        }
    }
    Ok(feedback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use kbchat_core::{Conversation, ConversationMessage, FeedbackType};

    use crate::queries::conversations::create_conversation;
    use crate::queries::messages::{create_conversation_message, get_message_detail};

    async fn seed(db: &Database, conversation_id: &str) {
        create_conversation(
            db,
            &Conversation {
                id: conversation_id.into(),
                nonce: "n".into(),
                kb_id: "kb".into(),
                app_id: "app".into(),
                subject: String::new(),
                remote_ip: String::new(),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
    }

    async fn add_message(db: &Database, conversation_id: &str, id: &str, role: Role, minute: i64) {
        let message = ConversationMessage {
            id: id.into(),
            conversation_id: conversation_id.into(),
            app_id: "app".into(),
            role,
            content: String::new(),
            provider: String::new(),
            model: String::new(),
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            remote_ip: String::new(),
            info: None,
            created_at: Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap()
                + Duration::minutes(minute),
        };
        create_conversation_message(db, &message, &[]).await.unwrap();
    }

    fn rate(message_id: &str, score: i32) -> FeedbackRequest {
        FeedbackRequest {
            message_id: message_id.into(),
            score,
            feedback_type: None,
            feedback_content: String::new(),
        }
    }

    #[tokio::test]
    async fn last_feedback_write_wins() {
        let db = Database::open_in_memory().await.unwrap();
        seed(&db, "c1").await;
        add_message(&db, "c1", "m1", Role::Assistant, 0).await;

        update_message_feedback(
            &db,
            &FeedbackRequest {
                message_id: "m1".into(),
                score: -1,
                feedback_type: Some(FeedbackType::Inaccurate),
                feedback_content: "wrong price".into(),
            },
        )
        .await
        .unwrap();
        update_message_feedback(&db, &rate("m1", 1)).await.unwrap();

        let info = get_message_detail(&db, "m1").await.unwrap().info.unwrap();
        assert_eq!(info.score, 1);
        assert_eq!(info.feedback_type, None);
        assert_eq!(info.feedback_content, "");
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn feedback_for_unknown_message_is_a_logged_no_op() {
        let db = Database::open_in_memory().await.unwrap();
        update_message_feedback(&db, &rate("ghost", 1)).await.unwrap();
        assert!(logs_contain("feedback for unknown message ignored"));
    }

    #[tokio::test]
    async fn empty_id_list_returns_empty_map() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(get_feedback_by_conversation_ids(&db, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn picks_latest_scored_assistant_message() {
        let db = Database::open_in_memory().await.unwrap();
        seed(&db, "c1").await;
        add_message(&db, "c1", "a1", Role::Assistant, 1).await;
        add_message(&db, "c1", "u1", Role::User, 2).await;
        add_message(&db, "c1", "a2", Role::Assistant, 3).await;
        add_message(&db, "c1", "a3", Role::Assistant, 4).await;

        update_message_feedback(&db, &rate("a2", 1)).await.unwrap();
        update_message_feedback(&db, &rate("a1", -1)).await.unwrap();
        // Latest assistant message, but its score is reset to zero.
        update_message_feedback(&db, &rate("a3", 0)).await.unwrap();
        // User messages never count.
        update_message_feedback(&db, &rate("u1", -1)).await.unwrap();

        let map = get_feedback_by_conversation_ids(&db, &["c1".to_string()])
            .await
            .unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["c1"].score, 1);
    }

    #[tokio::test]
    async fn conversations_without_feedback_are_absent() {
        let db = Database::open_in_memory().await.unwrap();
        seed(&db, "c1").await;
        seed(&db, "c2").await;
        add_message(&db, "c1", "a1", Role::Assistant, 1).await;
        add_message(&db, "c2", "a2", Role::Assistant, 1).await;
        update_message_feedback(&db, &rate("a2", -1)).await.unwrap();

        let ids = vec!["c1".to_string(), "c2".to_string(), "c3".to_string()];
        let map = get_feedback_by_conversation_ids(&db, &ids).await.unwrap();
        assert!(!map.contains_key("c1"));
        assert!(!map.contains_key("c3"));
        assert_eq!(map["c2"].score, -1);
    }
}
