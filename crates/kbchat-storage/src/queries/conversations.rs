// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation writes, listing, detail lookup, and nonce checks.

use kbchat_core::{
    Conversation, ConversationDetail, ConversationListFilter, ConversationListItem, KbchatError,
};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};
use tracing::debug;

use crate::database::Database;
use crate::filter::{Column, Filter};
use crate::models::{format_timestamp, timestamp_column, to_sql_int};
use crate::queries::query_optional;

const DETAIL_SELECT: &str = "SELECT conversations.id, conversations.kb_id, conversations.app_id,
        conversations.subject, conversations.remote_ip, conversations.created_at
     FROM conversations";

const LIST_SELECT: &str = "SELECT conversations.id, conversations.kb_id, conversations.app_id,
        conversations.subject, conversations.remote_ip, conversations.created_at,
        apps.name, apps.app_type
     FROM conversations
     LEFT JOIN apps ON conversations.app_id = apps.id";

fn row_to_detail(row: &Row<'_>) -> rusqlite::Result<ConversationDetail> {
    Ok(ConversationDetail {
        id: row.get(0)?,
        kb_id: row.get(1)?,
        app_id: row.get(2)?,
        subject: row.get(3)?,
        remote_ip: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
    })
}

fn row_to_list_item(row: &Row<'_>) -> rusqlite::Result<ConversationListItem> {
    Ok(ConversationListItem {
        id: row.get(0)?,
        kb_id: row.get(1)?,
        app_id: row.get(2)?,
        subject: row.get(3)?,
        remote_ip: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
        app_name: row.get(6)?,
        app_type: row.get(7)?,
    })
}

/// The filter shared by the listing count and the listing fetch.
pub fn list_filter(filter: &ConversationListFilter) -> Filter {
    Filter::new()
        .eq(Column::ConversationKbId, filter.kb_id.clone())
        .eq_opt(Column::ConversationAppId, filter.app_id.as_deref())
        .contains_opt(Column::ConversationSubject, filter.subject.as_deref())
        .contains_opt(Column::ConversationRemoteIp, filter.remote_ip.as_deref())
}

/// Insert a new conversation. A duplicate id is a constraint violation.
pub async fn create_conversation(
    db: &Database,
    conversation: &Conversation,
) -> Result<(), KbchatError> {
    let c = conversation.clone();
    db.call(move |conn| {
        conn.execute(
            "INSERT INTO conversations (id, nonce, kb_id, app_id, subject, remote_ip, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                c.id,
                c.nonce,
                c.kb_id,
                c.app_id,
                c.subject,
                c.remote_ip,
                format_timestamp(&c.created_at),
            ],
        )?;
        Ok(())
    })
    .await?;
    debug!(conversation_id = %conversation.id, kb_id = %conversation.kb_id, "conversation created");
    Ok(())
}

/// One page of conversations, newest first, plus the total number of
/// matching conversations across all pages.
pub async fn get_conversation_list(
    db: &Database,
    filter: &ConversationListFilter,
) -> Result<(Vec<ConversationListItem>, u64), KbchatError> {
    let clause = list_filter(filter).render();
    let limit = to_sql_int(filter.pagination.limit());
    let offset = to_sql_int(filter.pagination.offset());

    db.call(move |conn| {
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM conversations WHERE {}", clause.sql),
            params_from_iter(clause.params.iter()),
            |row| row.get(0),
        )?;

        let next = clause.next_index();
        let sql = format!(
            "{LIST_SELECT} WHERE {}
             ORDER BY conversations.created_at DESC, conversations.rowid DESC
             LIMIT ?{} OFFSET ?{}",
            clause.sql,
            next,
            next + 1
        );
        let mut params = clause.params.clone();
        params.push(Value::Integer(limit));
        params.push(Value::Integer(offset));

        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(params.iter()), row_to_list_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((items, u64::try_from(total).unwrap_or_default()))
    })
    .await
}

/// A single conversation, without its nonce.
pub async fn get_conversation_detail(
    db: &Database,
    id: &str,
) -> Result<ConversationDetail, KbchatError> {
    let clause = Filter::new()
        .eq(Column::ConversationId, id.to_string())
        .render();
    db.call(move |conn| query_optional(conn, DETAIL_SELECT, &clause, row_to_detail))
        .await?
        .ok_or(KbchatError::NotFound {
            entity: "conversation",
        })
}

/// Succeeds only when a conversation with both `id` and `nonce` exists.
///
/// An unknown id and a wrong nonce produce the same error.
pub async fn validate_conversation_nonce(
    db: &Database,
    id: &str,
    nonce: &str,
) -> Result<(), KbchatError> {
    let clause = Filter::new()
        .eq(Column::ConversationId, id.to_string())
        .eq(Column::ConversationNonce, nonce.to_string())
        .render();
    db.call(move |conn| {
        query_optional(conn, "SELECT 1 FROM conversations", &clause, |row| {
            row.get::<_, i64>(0)
        })
    })
    .await?
    .map(|_| ())
    .ok_or(KbchatError::NotFound {
        entity: "conversation",
    })
}

/// Remove a conversation together with its messages and references.
pub async fn delete_conversation(db: &Database, id: &str) -> Result<(), KbchatError> {
    let conversation_id = id.to_string();
    let deleted = db
        .transaction(move |tx| {
            let exists = tx
                .query_row(
                    "SELECT 1 FROM conversations WHERE id = ?1",
                    params![conversation_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !exists {
                return Ok(None);
            }
            let references = tx.execute(
                "DELETE FROM conversation_references WHERE conversation_id = ?1",
                params![conversation_id],
            )?;
            let messages = tx.execute(
                "DELETE FROM conversation_messages WHERE conversation_id = ?1",
                params![conversation_id],
            )?;
            tx.execute(
                "DELETE FROM conversations WHERE id = ?1",
                params![conversation_id],
            )?;
            Ok(Some((messages, references)))
        })
        .await?;

    match deleted {
        Some((messages, references)) => {
            debug!(conversation_id = %id, messages, references, "conversation deleted");
            Ok(())
        }
        None => Err(KbchatError::NotFound {
            entity: "conversation",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use kbchat_core::{ErrorKind, Pagination};

    fn conversation(id: &str, kb_id: &str, app_id: &str, minutes_ago: i64) -> Conversation {
        Conversation {
            id: id.to_string(),
            nonce: format!("nonce-{id}"),
            kb_id: kb_id.to_string(),
            app_id: app_id.to_string(),
            subject: format!("subject {id}"),
            remote_ip: "10.0.0.1".to_string(),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    fn list(kb_id: &str, page: u32, per_page: u32) -> ConversationListFilter {
        ConversationListFilter {
            kb_id: kb_id.to_string(),
            pagination: Pagination::new(page, per_page),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_and_get_detail() {
        let db = Database::open_in_memory().await.unwrap();
        let c = conversation("c1", "kb", "app", 5);
        create_conversation(&db, &c).await.unwrap();

        let detail = get_conversation_detail(&db, "c1").await.unwrap();
        assert_eq!(detail.id, "c1");
        assert_eq!(detail.subject, "subject c1");
        assert_eq!(detail.created_at, parse_back(&c));
    }

    fn parse_back(c: &Conversation) -> chrono::DateTime<Utc> {
        crate::models::parse_timestamp(&format_timestamp(&c.created_at)).unwrap()
    }

    #[tokio::test]
    async fn duplicate_id_is_constraint_violation() {
        let db = Database::open_in_memory().await.unwrap();
        let c = conversation("c1", "kb", "app", 5);
        create_conversation(&db, &c).await.unwrap();
        let err = create_conversation(&db, &c).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    }

    #[tokio::test]
    async fn create_cancelled_mid_insert_still_reports_success() {
        let db = Database::open_in_memory().await.unwrap();
        let token = tokio_util::sync::CancellationToken::new();
        let trigger = std::panic::AssertUnwindSafe(token.clone());
        db.call(move |conn| {
            conn.create_scalar_function(
                "cancel_request",
                0,
                rusqlite::functions::FunctionFlags::SQLITE_UTF8,
                move |_| {
                    trigger.cancel();
                    Ok(0_i64)
                },
            )?;
            conn.execute_batch(
                "CREATE TEMP TRIGGER cancel_on_insert AFTER INSERT ON conversations
                 BEGIN SELECT cancel_request(); END;",
            )
        })
        .await
        .unwrap();

        let scoped = db.with_cancellation(token.clone());
        create_conversation(&scoped, &conversation("c1", "kb", "app", 0))
            .await
            .unwrap();
        assert!(token.is_cancelled());
        assert_eq!(get_conversation_detail(&db, "c1").await.unwrap().id, "c1");
    }

    #[tokio::test]
    async fn subject_search_folds_non_ascii_case() {
        let db = Database::open_in_memory().await.unwrap();
        let mut c = conversation("c1", "kb", "app", 1);
        c.subject = "Über die Preise".to_string();
        create_conversation(&db, &c).await.unwrap();
        create_conversation(&db, &conversation("c2", "kb", "app", 2))
            .await
            .unwrap();

        let filter = ConversationListFilter {
            subject: Some("über".to_string()),
            ..list("kb", 1, 10)
        };
        let (items, total) = get_conversation_list(&db, &filter).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].id, "c1");
    }

    #[tokio::test]
    async fn missing_detail_is_not_found() {
        let db = Database::open_in_memory().await.unwrap();
        let err = get_conversation_detail(&db, "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_is_newest_first_with_total() {
        let db = Database::open_in_memory().await.unwrap();
        for (id, age) in [("old", 30), ("mid", 20), ("new", 10)] {
            create_conversation(&db, &conversation(id, "kb", "app", age))
                .await
                .unwrap();
        }
        create_conversation(&db, &conversation("other", "kb2", "app", 1))
            .await
            .unwrap();

        let (items, total) = get_conversation_list(&db, &list("kb", 1, 2)).await.unwrap();
        assert_eq!(total, 3);
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);

        let (items, total) = get_conversation_list(&db, &list("kb", 2, 2)).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "old");
    }

    #[tokio::test]
    async fn list_joins_app_metadata_when_present() {
        let db = Database::open_in_memory().await.unwrap();
        db.call(|conn| {
            conn.execute(
                "INSERT INTO apps (id, kb_id, name, app_type)
                 VALUES ('web', 'kb', 'Website', 'widget')",
                [],
            )
        })
        .await
        .unwrap();
        create_conversation(&db, &conversation("c1", "kb", "web", 2))
            .await
            .unwrap();
        create_conversation(&db, &conversation("c2", "kb", "gone", 1))
            .await
            .unwrap();

        let (items, _) = get_conversation_list(&db, &list("kb", 1, 10)).await.unwrap();
        assert_eq!(items[0].id, "c2");
        assert_eq!(items[0].app_name, None);
        assert_eq!(items[1].app_name.as_deref(), Some("Website"));
        assert_eq!(items[1].app_type.as_deref(), Some("widget"));
    }

    #[tokio::test]
    async fn list_applies_optional_filters() {
        let db = Database::open_in_memory().await.unwrap();
        let mut a = conversation("a", "kb", "web", 3);
        a.subject = "Refund for order".into();
        let mut b = conversation("b", "kb", "bot", 2);
        b.remote_ip = "192.168.1.20".into();
        let c = conversation("c", "kb", "web", 1);
        for conv in [&a, &b, &c] {
            create_conversation(&db, conv).await.unwrap();
        }

        let mut filter = list("kb", 1, 10);
        filter.app_id = Some("web".into());
        let (items, total) = get_conversation_list(&db, &filter).await.unwrap();
        assert_eq!(total, 2);
        assert!(items.iter().all(|i| i.app_id == "web"));

        let mut filter = list("kb", 1, 10);
        filter.subject = Some("REFUND".into());
        let (items, _) = get_conversation_list(&db, &filter).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "a");

        let mut filter = list("kb", 1, 10);
        filter.remote_ip = Some("192.168".into());
        filter.app_id = Some(String::new());
        let (items, _) = get_conversation_list(&db, &filter).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "b");
    }

    #[tokio::test]
    async fn page_past_end_is_empty_but_counts() {
        let db = Database::open_in_memory().await.unwrap();
        create_conversation(&db, &conversation("c1", "kb", "app", 1))
            .await
            .unwrap();
        let (items, total) = get_conversation_list(&db, &list("kb", 5, 10)).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn nonce_mismatch_and_unknown_id_are_indistinguishable() {
        let db = Database::open_in_memory().await.unwrap();
        create_conversation(&db, &conversation("c1", "kb", "app", 1))
            .await
            .unwrap();

        validate_conversation_nonce(&db, "c1", "nonce-c1").await.unwrap();

        let wrong = validate_conversation_nonce(&db, "c1", "guess")
            .await
            .unwrap_err();
        let unknown = validate_conversation_nonce(&db, "c9", "nonce-c1")
            .await
            .unwrap_err();
        assert_eq!(wrong.kind(), ErrorKind::NotFound);
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn delete_missing_conversation_is_not_found() {
        let db = Database::open_in_memory().await.unwrap();
        let err = delete_conversation(&db, "ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_removes_conversation() {
        let db = Database::open_in_memory().await.unwrap();
        create_conversation(&db, &conversation("c1", "kb", "app", 1))
            .await
            .unwrap();
        delete_conversation(&db, "c1").await.unwrap();
        assert!(get_conversation_detail(&db, "c1").await.unwrap_err().is_not_found());
    }
}
