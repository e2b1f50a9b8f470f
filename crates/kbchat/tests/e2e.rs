// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the conversation store.
//!
//! Each test creates an isolated TestHarness backed by a temp SQLite file.
//! Tests are independent and order-insensitive.

use std::collections::HashSet;

use kbchat_core::{
    ConversationListFilter, ConversationStore, ErrorKind, FeedbackType, Pagination, Role,
    StorageAdapter,
};
use kbchat_test_utils::TestHarness;
use kbchat_test_utils::fixtures::{
    conversation, conversation_at, dislike, hours_ago, like, message, reference,
};
use tokio_util::sync::CancellationToken;

// ---- Atomic write ----

#[tokio::test]
async fn message_and_references_are_all_or_nothing() {
    let harness = TestHarness::new().await.unwrap();
    let conv = conversation("c1", "kb", "web");
    harness.store.create_conversation(&conv).await.unwrap();

    let reply = message("m1", &conv, Role::Assistant, 1);
    let mut broken = reference("r2", &conv);
    broken.conversation_id = "does-not-exist".into();

    let err = harness
        .store
        .create_conversation_message(&reply, &[reference("r1", &conv), broken])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransactionAborted);

    assert!(harness.store.get_message_detail("m1").await.unwrap_err().is_not_found());
    assert!(harness.store.get_conversation_references("c1").await.unwrap().is_empty());
    assert_eq!(harness.count_rows("conversation_references").await.unwrap(), 0);

    // The same write succeeds once the batch is valid.
    harness
        .store
        .create_conversation_message(&reply, &[reference("r1", &conv), reference("r2", &conv)])
        .await
        .unwrap();
    assert_eq!(
        harness.store.get_conversation_references("c1").await.unwrap().len(),
        2
    );
}

// ---- Ordering ----

#[tokio::test]
async fn messages_come_back_in_creation_order() {
    let harness = TestHarness::new().await.unwrap();
    let conv = conversation("c1", "kb", "web");
    harness.store.create_conversation(&conv).await.unwrap();

    for (id, role, secs) in [
        ("m3", Role::Assistant, 30),
        ("m1", Role::User, 10),
        ("m2", Role::Assistant, 20),
    ] {
        harness
            .store
            .create_conversation_message(&message(id, &conv, role, secs), &[])
            .await
            .unwrap();
    }

    let messages = harness.store.get_conversation_messages("c1").await.unwrap();
    let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
    assert!(messages.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

// ---- Count/list consistency ----

#[tokio::test]
async fn total_matches_rows_across_all_pages() {
    let harness = TestHarness::new().await.unwrap();
    harness.seed_app("web", "kb", "Website", "widget").await.unwrap();
    for i in 0..23 {
        let app = if i % 3 == 0 { "bot" } else { "web" };
        let mut conv = conversation_at(&format!("c{i:02}"), "kb", app, hours_ago(i));
        if i % 4 == 0 {
            conv.subject = format!("Refund question {i}");
        }
        harness.store.create_conversation(&conv).await.unwrap();
    }
    harness
        .store
        .create_conversation(&conversation("other", "kb-2", "web"))
        .await
        .unwrap();

    let filters = [
        ConversationListFilter {
            kb_id: "kb".into(),
            ..Default::default()
        },
        ConversationListFilter {
            kb_id: "kb".into(),
            app_id: Some("web".into()),
            ..Default::default()
        },
        ConversationListFilter {
            kb_id: "kb".into(),
            subject: Some("refund".into()),
            ..Default::default()
        },
    ];

    for base in filters {
        let mut seen = Vec::new();
        let mut page = 1;
        let total = loop {
            let filter = ConversationListFilter {
                pagination: Pagination::new(page, 5),
                ..base.clone()
            };
            let (items, total) = harness.store.get_conversation_list(&filter).await.unwrap();
            if items.is_empty() {
                break total;
            }
            seen.extend(items.into_iter().map(|i| i.id));
            page += 1;
        };

        assert_eq!(total as usize, seen.len(), "filter {base:?}");
        let unique: HashSet<_> = seen.iter().collect();
        assert_eq!(unique.len(), seen.len(), "pages overlap for {base:?}");
    }
}

#[tokio::test]
async fn listing_is_newest_first_and_joins_apps() {
    let harness = TestHarness::new().await.unwrap();
    harness.seed_app("web", "kb", "Website", "widget").await.unwrap();
    harness
        .store
        .create_conversation(&conversation_at("older", "kb", "web", hours_ago(2)))
        .await
        .unwrap();
    harness
        .store
        .create_conversation(&conversation_at("newer", "kb", "orphan", hours_ago(1)))
        .await
        .unwrap();

    let (items, total) = harness
        .store
        .get_conversation_list(&ConversationListFilter {
            kb_id: "kb".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(items[0].id, "newer");
    assert_eq!(items[0].app_name, None);
    assert_eq!(items[1].app_name.as_deref(), Some("Website"));
}

// ---- Feedback ----

#[tokio::test]
async fn second_feedback_replaces_first() {
    let harness = TestHarness::new().await.unwrap();
    let conv = conversation("c1", "kb", "web");
    harness.store.create_conversation(&conv).await.unwrap();
    harness
        .store
        .create_conversation_message(&message("m1", &conv, Role::Assistant, 1), &[])
        .await
        .unwrap();

    harness
        .store
        .update_message_feedback(&dislike("m1", FeedbackType::Incomplete, "missing steps"))
        .await
        .unwrap();
    harness.store.update_message_feedback(&like("m1")).await.unwrap();

    let info = harness
        .store
        .get_message_detail("m1")
        .await
        .unwrap()
        .info
        .unwrap();
    assert_eq!(info.score, 1);
    assert_eq!(info.feedback_type, None);
    assert!(info.feedback_content.is_empty());
}

#[tokio::test]
async fn feedback_fold_returns_latest_scored_reply() {
    let harness = TestHarness::new().await.unwrap();
    let conv = conversation("c1", "kb", "web");
    harness.store.create_conversation(&conv).await.unwrap();
    for (id, role, secs) in [
        ("u1", Role::User, 0),
        ("a1", Role::Assistant, 1),
        ("u2", Role::User, 2),
        ("a2", Role::Assistant, 3),
    ] {
        harness
            .store
            .create_conversation_message(&message(id, &conv, role, secs), &[])
            .await
            .unwrap();
    }

    // Submit the later one first; the fold goes by message time.
    harness
        .store
        .update_message_feedback(&dislike("a2", FeedbackType::Inaccurate, "wrong"))
        .await
        .unwrap();
    harness.store.update_message_feedback(&like("a1")).await.unwrap();

    let map = harness
        .store
        .get_feedback_by_conversation_ids(&["c1".to_string(), "unknown".to_string()])
        .await
        .unwrap();
    assert_eq!(map.len(), 1);
    assert_eq!(map["c1"].score, -1);
    assert_eq!(map["c1"].feedback_type, Some(FeedbackType::Inaccurate));
}

#[tokio::test]
async fn empty_feedback_lookup_returns_empty_map() {
    let harness = TestHarness::new().await.unwrap();
    let map = harness
        .store
        .get_feedback_by_conversation_ids(&[])
        .await
        .unwrap();
    assert!(map.is_empty());
}

// ---- Nonce symmetry ----

#[tokio::test]
async fn nonce_errors_do_not_reveal_existence() {
    let harness = TestHarness::new().await.unwrap();
    let conv = conversation("c1", "kb", "web");
    harness.store.create_conversation(&conv).await.unwrap();

    harness
        .store
        .validate_conversation_nonce("c1", &conv.nonce)
        .await
        .unwrap();

    let wrong_nonce = harness
        .store
        .validate_conversation_nonce("c1", "not-the-nonce")
        .await
        .unwrap_err();
    let unknown_id = harness
        .store
        .validate_conversation_nonce("c404", &conv.nonce)
        .await
        .unwrap_err();
    assert_eq!(wrong_nonce.kind(), unknown_id.kind());
    assert_eq!(wrong_nonce.to_string(), unknown_id.to_string());
}

// ---- Windowed count ----

#[tokio::test]
async fn count_and_distribution_cover_the_last_day() {
    let harness = TestHarness::new().await.unwrap();
    for (id, app, hours) in [
        ("stale", "web", 25),
        ("fresh", "web", 23),
        ("bot-1", "bot", 2),
        ("bot-2", "bot", 1),
    ] {
        harness
            .store
            .create_conversation(&conversation_at(id, "kb", app, hours_ago(hours)))
            .await
            .unwrap();
    }

    assert_eq!(harness.store.get_conversation_count("kb").await.unwrap(), 3);

    let dist = harness.store.get_conversation_distribution("kb").await.unwrap();
    let pairs: Vec<(&str, u64)> = dist.iter().map(|e| (e.app_id.as_str(), e.count)).collect();
    assert_eq!(pairs, vec![("bot", 2), ("web", 1)]);
}

// ---- Supplementary operations ----

#[tokio::test]
async fn delete_removes_everything_for_the_conversation() {
    let harness = TestHarness::new().await.unwrap();
    let keep = conversation("keep", "kb", "web");
    let drop = conversation("drop", "kb", "web");
    for conv in [&keep, &drop] {
        harness.store.create_conversation(conv).await.unwrap();
        harness
            .store
            .create_conversation_message(
                &message(&format!("{}-m", conv.id), conv, Role::Assistant, 1),
                &[reference(&format!("{}-r", conv.id), conv)],
            )
            .await
            .unwrap();
    }

    harness.store.delete_conversation("drop").await.unwrap();

    assert!(harness.store.get_conversation_detail("drop").await.unwrap_err().is_not_found());
    assert!(harness.store.get_conversation_messages("drop").await.unwrap().is_empty());
    assert!(harness.store.get_conversation_references("drop").await.unwrap().is_empty());
    assert_eq!(harness.store.get_conversation_messages("keep").await.unwrap().len(), 1);
    assert!(harness.store.delete_conversation("drop").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn cancelled_request_writes_nothing() {
    let harness = TestHarness::new().await.unwrap();
    let conv = conversation("c1", "kb", "web");
    harness.store.create_conversation(&conv).await.unwrap();

    let token = CancellationToken::new();
    let request = harness.store.with_cancellation(token.clone());
    token.cancel();

    let err = request
        .create_conversation_message(
            &message("m1", &conv, Role::Assistant, 1),
            &[reference("r1", &conv)],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(harness.count_rows("conversation_messages").await.unwrap(), 0);

    let read = request.get_conversation_detail("c1").await.unwrap_err();
    assert_eq!(read.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn data_survives_reopen() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .store
        .create_conversation(&conversation("c1", "kb", "web"))
        .await
        .unwrap();
    harness.store.close().await.unwrap();

    let reopened = kbchat_storage::SqliteConversationStore::new(harness.config.clone());
    reopened.initialize().await.unwrap();
    let detail = reopened.get_conversation_detail("c1").await.unwrap();
    assert_eq!(detail.kb_id, "kb");
}
