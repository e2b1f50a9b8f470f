// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entity builders with sensible defaults.
//!
//! Timestamps are expressed relative to "now" so that windowed statistics
//! see them the same way regardless of when the test runs.

use chrono::{DateTime, Duration, Utc};
use kbchat_core::{
    Conversation, ConversationMessage, ConversationReference, FeedbackRequest, FeedbackType, Role,
};

/// A point in time `hours` before now.
pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(hours)
}

/// A fresh random identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn conversation(id: &str, kb_id: &str, app_id: &str) -> Conversation {
    Conversation {
        id: id.to_string(),
        nonce: new_id(),
        kb_id: kb_id.to_string(),
        app_id: app_id.to_string(),
        subject: format!("Question {id}"),
        remote_ip: "203.0.113.7".to_string(),
        created_at: Utc::now(),
    }
}

pub fn conversation_at(
    id: &str,
    kb_id: &str,
    app_id: &str,
    created_at: DateTime<Utc>,
) -> Conversation {
    Conversation {
        created_at,
        ..conversation(id, kb_id, app_id)
    }
}

/// A message in `conversation`, created `seconds` after the conversation.
pub fn message(
    id: &str,
    conversation: &Conversation,
    role: Role,
    seconds: i64,
) -> ConversationMessage {
    ConversationMessage {
        id: id.to_string(),
        conversation_id: conversation.id.clone(),
        app_id: conversation.app_id.clone(),
        role,
        content: format!("{role} says {id}"),
        provider: "openai".to_string(),
        model: "gpt-4o-mini".to_string(),
        prompt_tokens: 12,
        completion_tokens: 34,
        total_tokens: 46,
        remote_ip: conversation.remote_ip.clone(),
        info: None,
        created_at: conversation.created_at + Duration::seconds(seconds),
    }
}

pub fn reference(id: &str, conversation: &Conversation) -> ConversationReference {
    ConversationReference {
        id: id.to_string(),
        conversation_id: conversation.id.clone(),
        app_id: conversation.app_id.clone(),
        node_id: format!("node-{id}"),
        name: format!("Document {id}"),
        url: format!("https://kb.example.com/doc/{id}"),
    }
}

pub fn like(message_id: &str) -> FeedbackRequest {
    FeedbackRequest {
        message_id: message_id.to_string(),
        score: 1,
        feedback_type: None,
        feedback_content: String::new(),
    }
}

pub fn dislike(message_id: &str, feedback_type: FeedbackType, note: &str) -> FeedbackRequest {
    FeedbackRequest {
        message_id: message_id.to_string(),
        score: -1,
        feedback_type: Some(feedback_type),
        feedback_content: note.to_string(),
    }
}
