// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Column codecs between SQLite rows and the kbchat-core entity types.
//!
//! Timestamps are stored as RFC 3339 UTC text with millisecond precision,
//! the same shape SQLite's `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')` produces,
//! so stored values and the query-time window bound compare as strings.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use kbchat_core::{FeedbackInfo, KbchatError, Role};
use rusqlite::Row;
use rusqlite::types::Type;

/// `strftime` pattern matching [`format_timestamp`].
pub const SQL_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%fZ";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|ts| ts.with_timezone(&Utc))
}

pub(crate) fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn role_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Role> {
    let raw: String = row.get(idx)?;
    Role::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Decode the nullable JSON feedback column.
pub(crate) fn info_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<FeedbackInfo>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|json| {
        serde_json::from_str(&json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub(crate) fn encode_info(info: &FeedbackInfo) -> Result<String, KbchatError> {
    serde_json::to_string(info).map_err(|e| KbchatError::Internal(format!("encode feedback: {e}")))
}

/// SQLite integers are signed; counts and page bounds are not.
pub(crate) fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
