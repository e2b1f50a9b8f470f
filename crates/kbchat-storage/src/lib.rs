// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for kbchat conversations.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, a typed WHERE-clause builder, and
//! the [`SqliteConversationStore`] implementation of
//! [`kbchat_core::ConversationStore`].

pub mod adapter;
pub mod database;
pub mod filter;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod writer;

pub use adapter::SqliteConversationStore;
pub use database::{Database, OpenOptions};
pub use filter::{Column, Filter, Predicate, Since, WhereClause};
