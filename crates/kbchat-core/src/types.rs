// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entity, value, and projection types shared across store implementations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One end-user chat session with the assistant.
///
/// Created once by the answering pipeline; never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    /// Single-use token bound to the conversation, checked on follow-up requests.
    pub nonce: String,
    pub kb_id: String,
    pub app_id: String,
    pub subject: String,
    pub remote_ip: String,
    pub created_at: DateTime<Utc>,
}

/// Actor that produced a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Category attached to a piece of feedback.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Inaccurate,
    Incomplete,
    Irrelevant,
    Other,
}

/// Rating, category, and note attached to a single message.
///
/// Stored inline on the message and replaced wholesale on every submission.
/// A score of `0` means no feedback has been given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackInfo {
    /// Signed rating: `1` like, `-1` dislike, `0` unset.
    #[serde(default)]
    pub score: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_type: Option<FeedbackType>,
    #[serde(default)]
    pub feedback_content: String,
}

impl FeedbackInfo {
    /// Whether this value records feedback that was actually given.
    pub fn is_given(&self) -> bool {
        self.score != 0
    }
}

/// One turn within a conversation.
///
/// Only `info` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub conversation_id: String,
    pub app_id: String,
    pub role: Role,
    pub content: String,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub remote_ip: String,
    pub info: Option<FeedbackInfo>,
    pub created_at: DateTime<Utc>,
}

/// A source document cited by an assistant reply.
///
/// Keyed to the conversation rather than the individual message; written
/// only together with a message and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationReference {
    pub id: String,
    pub conversation_id: String,
    pub app_id: String,
    pub node_id: String,
    pub name: String,
    pub url: String,
}

/// Feedback submission for a single message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub message_id: String,
    pub score: i32,
    #[serde(default, rename = "type")]
    pub feedback_type: Option<FeedbackType>,
    #[serde(default)]
    pub feedback_content: String,
}

impl FeedbackRequest {
    /// Builds the value that replaces whatever feedback the message held before.
    pub fn to_info(&self) -> FeedbackInfo {
        FeedbackInfo {
            score: self.score,
            feedback_type: self.feedback_type,
            feedback_content: self.feedback_content.clone(),
        }
    }
}

/// Page request. `page` is 1-based; page 0 is treated as the first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

/// Filter for conversation listings.
///
/// Empty optional strings are treated the same as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationListFilter {
    pub kb_id: String,
    pub app_id: Option<String>,
    /// Case-insensitive substring of the subject.
    pub subject: Option<String>,
    /// Case-insensitive substring of the client address.
    pub remote_ip: Option<String>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// A conversation row joined with its application metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationListItem {
    pub id: String,
    pub kb_id: String,
    pub app_id: String,
    pub subject: String,
    pub remote_ip: String,
    pub created_at: DateTime<Utc>,
    /// `None` when the application row is missing.
    pub app_name: Option<String>,
    pub app_type: Option<String>,
}

/// A single conversation without its nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationDetail {
    pub id: String,
    pub kb_id: String,
    pub app_id: String,
    pub subject: String,
    pub remote_ip: String,
    pub created_at: DateTime<Utc>,
}

/// Number of recent conversations started through one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub app_id: String,
    pub count: u64,
}

/// Health status reported by store health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Store is fully operational.
    Healthy,
    /// Store is operational but experiencing issues.
    Degraded(String),
    /// Store is not operational.
    Unhealthy(String),
}
