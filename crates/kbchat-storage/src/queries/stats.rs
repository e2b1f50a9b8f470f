// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trailing-window conversation statistics.

use std::time::Duration;

use kbchat_core::{DistributionEntry, KbchatError};

use crate::database::Database;
use crate::filter::{Column, Filter, Predicate, Since};
use crate::queries::query_all;

/// Length of the statistics window. The window ends at the moment the query
/// runs, as seen by the database.
pub const STATS_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

fn recent(kb_id: &str) -> Filter {
    Filter::new()
        .eq(Column::ConversationKbId, kb_id.to_string())
        .and(Predicate::After(
            Column::ConversationCreatedAt,
            Since::Trailing(STATS_WINDOW),
        ))
}

/// Number of conversations in `kb_id` started within the window.
pub async fn get_conversation_count(db: &Database, kb_id: &str) -> Result<u64, KbchatError> {
    let clause = recent(kb_id).render();
    let count = db
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT COUNT(*) FROM conversations WHERE {}", clause.sql),
                rusqlite::params_from_iter(clause.params.iter()),
                |row| row.get::<_, i64>(0),
            )
        })
        .await?;
    Ok(u64::try_from(count).unwrap_or_default())
}

/// Per-application conversation counts within the window, largest first.
///
/// Applications with no recent conversations are omitted.
pub async fn get_conversation_distribution(
    db: &Database,
    kb_id: &str,
) -> Result<Vec<DistributionEntry>, KbchatError> {
    let clause = recent(kb_id).render();
    db.call(move |conn| {
        query_all(
            conn,
            "SELECT conversations.app_id, COUNT(*) AS total FROM conversations",
            &clause,
            "GROUP BY conversations.app_id ORDER BY total DESC, conversations.app_id ASC",
            |row| {
                Ok(DistributionEntry {
                    app_id: row.get(0)?,
                    count: u64::try_from(row.get::<_, i64>(1)?).unwrap_or_default(),
                })
            },
        )
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kbchat_core::Conversation;

    use crate::queries::conversations::create_conversation;

    async fn started(db: &Database, id: &str, kb_id: &str, app_id: &str, hours_ago: i64) {
        create_conversation(
            db,
            &Conversation {
                id: id.into(),
                nonce: "n".into(),
                kb_id: kb_id.into(),
                app_id: app_id.into(),
                subject: String::new(),
                remote_ip: String::new(),
                created_at: Utc::now() - chrono::Duration::hours(hours_ago),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn count_only_includes_the_last_day() {
        let db = Database::open_in_memory().await.unwrap();
        started(&db, "old", "kb", "web", 25).await;
        started(&db, "recent", "kb", "web", 23).await;
        started(&db, "now", "kb", "bot", 0).await;
        started(&db, "elsewhere", "kb2", "web", 1).await;

        assert_eq!(get_conversation_count(&db, "kb").await.unwrap(), 2);
        assert_eq!(get_conversation_count(&db, "unknown").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn distribution_groups_recent_conversations_by_app() {
        let db = Database::open_in_memory().await.unwrap();
        started(&db, "c1", "kb", "web", 1).await;
        started(&db, "c2", "kb", "web", 2).await;
        started(&db, "c3", "kb", "bot", 3).await;
        started(&db, "c4", "kb", "api", 30).await;

        let dist = get_conversation_distribution(&db, "kb").await.unwrap();
        assert_eq!(
            dist,
            vec![
                DistributionEntry {
                    app_id: "web".into(),
                    count: 2
                },
                DistributionEntry {
                    app_id: "bot".into(),
                    count: 1
                },
            ]
        );

        let total: u64 = dist.iter().map(|e| e.count).sum();
        assert_eq!(total, get_conversation_count(&db, "kb").await.unwrap());
    }

    #[tokio::test]
    async fn empty_knowledge_base_has_empty_distribution() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(get_conversation_distribution(&db, "kb").await.unwrap().is_empty());
    }

    #[test]
    fn window_is_one_day() {
        assert_eq!(STATS_WINDOW.as_secs(), 86_400);
    }
}
