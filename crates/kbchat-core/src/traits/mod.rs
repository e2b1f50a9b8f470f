// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store trait definitions.
//!
//! Traits use `#[async_trait]` for dynamic dispatch compatibility so callers
//! can hold an `Arc<dyn ConversationStore>`.

pub mod conversation;
pub mod storage;

pub use conversation::ConversationStore;
pub use storage::StorageAdapter;
