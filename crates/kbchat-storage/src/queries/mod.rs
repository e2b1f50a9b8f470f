// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed read and write operations, one module per concern.

pub mod conversations;
pub mod feedback;
pub mod messages;
pub mod references;
pub mod stats;

use rusqlite::{OptionalExtension, Row, params_from_iter};

use crate::filter::WhereClause;

/// Run `select` (which must end where the WHERE clause goes) and collect
/// every row. `suffix` is appended after the clause.
pub(crate) fn query_all<T>(
    conn: &rusqlite::Connection,
    select: &str,
    clause: &WhereClause,
    suffix: &str,
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Vec<T>> {
    let sql = format!("{select} WHERE {} {suffix}", clause.sql);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(clause.params.iter()), map)?;
    rows.collect()
}

/// Like [`query_all`] but for at most one row.
pub(crate) fn query_optional<T>(
    conn: &rusqlite::Connection,
    select: &str,
    clause: &WhereClause,
    map: impl FnOnce(&Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Option<T>> {
    let sql = format!("{select} WHERE {} LIMIT 1", clause.sql);
    conn.query_row(&sql, params_from_iter(clause.params.iter()), map)
        .optional()
}
