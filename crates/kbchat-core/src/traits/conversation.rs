// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conversation persistence contract exposed to the API layer.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::KbchatError;
use crate::types::{
    Conversation, ConversationDetail, ConversationListFilter, ConversationListItem,
    ConversationMessage, ConversationReference, DistributionEntry, FeedbackInfo, FeedbackRequest,
};

/// Persistence and query operations for conversations, messages,
/// references, and message feedback.
///
/// Inputs are assumed to be validated by the caller. Each method is a single
/// unit of work; only [`create_conversation_message`](Self::create_conversation_message)
/// and [`delete_conversation`](Self::delete_conversation) span more than one
/// statement atomically.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Inserts a new conversation row.
    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), KbchatError>;

    /// Inserts a message and, when non-empty, its references as one transaction.
    async fn create_conversation_message(
        &self,
        message: &ConversationMessage,
        references: &[ConversationReference],
    ) -> Result<(), KbchatError>;

    /// Returns one page of matching conversations, newest first, and the
    /// total number of matches regardless of the page window.
    async fn get_conversation_list(
        &self,
        filter: &ConversationListFilter,
    ) -> Result<(Vec<ConversationListItem>, u64), KbchatError>;

    async fn get_conversation_detail(&self, id: &str) -> Result<ConversationDetail, KbchatError>;

    async fn get_conversation_references(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ConversationReference>, KbchatError>;

    /// Returns every message of a conversation, oldest first.
    async fn get_conversation_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ConversationMessage>, KbchatError>;

    /// Succeeds only if a conversation with exactly this id and nonce exists.
    ///
    /// An unknown id and a wrong nonce produce the same `NotFound` error.
    async fn validate_conversation_nonce(&self, id: &str, nonce: &str) -> Result<(), KbchatError>;

    async fn get_message_detail(&self, message_id: &str)
    -> Result<ConversationMessage, KbchatError>;

    /// Replaces the feedback stored on a message.
    async fn update_message_feedback(&self, feedback: &FeedbackRequest)
    -> Result<(), KbchatError>;

    /// Maps each conversation id to its most recent scored assistant feedback.
    ///
    /// Conversations without such feedback are absent from the map.
    async fn get_feedback_by_conversation_ids(
        &self,
        conversation_ids: &[String],
    ) -> Result<HashMap<String, FeedbackInfo>, KbchatError>;

    /// Per-application counts of conversations started in the trailing 24 hours.
    async fn get_conversation_distribution(
        &self,
        kb_id: &str,
    ) -> Result<Vec<DistributionEntry>, KbchatError>;

    /// Number of conversations started in the trailing 24 hours.
    async fn get_conversation_count(&self, kb_id: &str) -> Result<u64, KbchatError>;

    /// Removes a conversation together with its messages and references.
    async fn delete_conversation(&self, id: &str) -> Result<(), KbchatError>;
}
