// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations.
//!
//! The SQL files under `migrations/` are compiled in with refinery and
//! applied every time a database is opened.

use kbchat_core::KbchatError;
use tracing::debug;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply every migration the database has not seen yet.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), KbchatError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| KbchatError::Storage {
            source: Box::new(e),
        })?;
    for migration in report.applied_migrations() {
        debug!(version = migration.version(), name = migration.name(), "migration applied");
    }
    Ok(())
}
