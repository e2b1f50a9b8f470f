// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for kbchat conversation persistence.
//!
//! This crate provides the entity types, error taxonomy, and store traits
//! shared by the storage backend, its test utilities, and the admin binary.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ErrorKind, KbchatError};
pub use types::{
    Conversation, ConversationDetail, ConversationListFilter, ConversationListItem,
    ConversationMessage, ConversationReference, DistributionEntry, FeedbackInfo, FeedbackRequest,
    FeedbackType, HealthStatus, Pagination, Role,
};

pub use traits::{ConversationStore, StorageAdapter};
