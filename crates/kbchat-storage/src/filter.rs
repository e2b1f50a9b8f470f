// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Composable WHERE clauses.
//!
//! A [`Filter`] is a conjunction of typed [`Predicate`]s over a closed set of
//! [`Column`]s. Rendering produces SQL text with numbered placeholders plus
//! the matching parameter list, so user input never reaches the SQL string.
//! Listing count and listing fetch render the same filter and therefore
//! always select the same rows.

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;

use crate::models::{SQL_TIMESTAMP_FORMAT, format_timestamp};

/// Columns that predicates may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    ConversationId,
    ConversationNonce,
    ConversationKbId,
    ConversationAppId,
    ConversationSubject,
    ConversationRemoteIp,
    ConversationCreatedAt,
    MessageId,
    MessageConversationId,
    MessageRole,
    MessageInfo,
    /// The `score` field inside the message's feedback JSON.
    MessageScore,
    ReferenceConversationId,
}

impl Column {
    pub fn sql(self) -> &'static str {
        match self {
            Column::ConversationId => "conversations.id",
            Column::ConversationNonce => "conversations.nonce",
            Column::ConversationKbId => "conversations.kb_id",
            Column::ConversationAppId => "conversations.app_id",
            Column::ConversationSubject => "conversations.subject",
            Column::ConversationRemoteIp => "conversations.remote_ip",
            Column::ConversationCreatedAt => "conversations.created_at",
            Column::MessageId => "conversation_messages.id",
            Column::MessageConversationId => "conversation_messages.conversation_id",
            Column::MessageRole => "conversation_messages.role",
            Column::MessageInfo => "conversation_messages.info",
            Column::MessageScore => "json_extract(conversation_messages.info, '$.score')",
            Column::ReferenceConversationId => "conversation_references.conversation_id",
        }
    }
}

/// Lower bound for a timestamp column.
#[derive(Debug, Clone, PartialEq)]
pub enum Since {
    /// A fixed instant chosen by the caller.
    Instant(DateTime<Utc>),
    /// `now - duration`, where `now` is read by the database when the
    /// statement runs.
    Trailing(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals(Column, Value),
    NotEquals(Column, Value),
    /// Case-insensitive substring match, folding case with Unicode rules
    /// through the `casefold` SQL function. `%` and `_` in the needle match
    /// literally.
    Contains(Column, String),
    /// Strictly after the bound.
    After(Column, Since),
    /// Membership in a list. An empty list matches nothing.
    InList(Column, Vec<Value>),
    NotNull(Column),
}

/// Rendered SQL fragment and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
    first_index: usize,
}

impl WhereClause {
    /// Index of the next free `?N` placeholder after this clause.
    pub fn next_index(&self) -> usize {
        self.first_index + self.params.len()
    }
}

/// A conjunction of predicates. The empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn eq(self, column: Column, value: impl Into<Value>) -> Self {
        self.and(Predicate::Equals(column, value.into()))
    }

    /// Adds an equality predicate unless `value` is `None` or empty.
    pub fn eq_opt(self, column: Column, value: Option<&str>) -> Self {
        match value.filter(|v| !v.is_empty()) {
            Some(v) => self.eq(column, v.to_string()),
            None => self,
        }
    }

    /// Adds a substring predicate unless `needle` is `None` or empty.
    pub fn contains_opt(self, column: Column, needle: Option<&str>) -> Self {
        match needle.filter(|v| !v.is_empty()) {
            Some(v) => self.and(Predicate::Contains(column, v.to_string())),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn render(&self) -> WhereClause {
        self.render_from(1)
    }

    /// Render with placeholders numbered from `first_index`.
    pub fn render_from(&self, first_index: usize) -> WhereClause {
        let mut params = Vec::new();
        let parts: Vec<String> = self
            .predicates
            .iter()
            .map(|p| render_predicate(p, first_index, &mut params))
            .collect();

        let sql = if parts.is_empty() {
            "1 = 1".to_string()
        } else {
            parts.join(" AND ")
        };
        WhereClause {
            sql,
            params,
            first_index,
        }
    }
}

fn render_predicate(predicate: &Predicate, first_index: usize, params: &mut Vec<Value>) -> String {
    let mut bind = |value: Value| {
        params.push(value);
        format!("?{}", first_index + params.len() - 1)
    };

    match predicate {
        Predicate::Equals(col, value) => format!("{} = {}", col.sql(), bind(value.clone())),
        Predicate::NotEquals(col, value) => format!("{} != {}", col.sql(), bind(value.clone())),
        Predicate::Contains(col, needle) => format!(
            "casefold({}) LIKE {} ESCAPE '\\'",
            col.sql(),
            bind(Value::Text(like_pattern(&needle.to_lowercase())))
        ),
        Predicate::After(col, Since::Instant(ts)) => {
            format!("{} > {}", col.sql(), bind(Value::Text(format_timestamp(ts))))
        }
        Predicate::After(col, Since::Trailing(window)) => {
            let modifier = format!("-{} seconds", window.as_secs());
            format!(
                "{} > strftime('{SQL_TIMESTAMP_FORMAT}', 'now', {})",
                col.sql(),
                bind(Value::Text(modifier))
            )
        }
        Predicate::InList(_, values) if values.is_empty() => "0 = 1".to_string(),
        Predicate::InList(col, values) => {
            let mut sql = format!("{} IN (", col.sql());
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                let _ = write!(sql, "{}", bind(value.clone()));
            }
            sql.push(')');
            sql
        }
        Predicate::NotNull(col) => format!("{} IS NOT NULL", col.sql()),
    }
}

/// Build a `LIKE` pattern matching `needle` anywhere, with `\` as escape.
pub fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
