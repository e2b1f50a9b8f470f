// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements run on tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use kbchat_config::model::StorageConfig;
use kbchat_core::KbchatError;
use rusqlite::ErrorCode;
use rusqlite::functions::FunctionFlags;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Connection settings applied when a database is opened.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub wal_mode: bool,
    pub busy_timeout: Duration,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            wal_mode: true,
            busy_timeout: Duration::from_millis(5_000),
        }
    }
}

impl From<&StorageConfig> for OpenOptions {
    fn from(config: &StorageConfig) -> Self {
        Self {
            wal_mode: config.wal_mode,
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        }
    }
}

/// Handle to the conversation database.
///
/// Cloning is cheap: clones share the same background connection. Each clone
/// carries its own cancellation token, see [`Database::with_cancellation`].
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open (or create) the database at `path` with default options and
    /// apply pending migrations.
    pub async fn open(path: &str) -> Result<Self, KbchatError> {
        Self::open_with(path, OpenOptions::default()).await
    }

    /// Open the database described by the `[storage]` config section.
    pub async fn open_with_config(config: &StorageConfig) -> Result<Self, KbchatError> {
        Self::open_with(&config.database_path, OpenOptions::from(config)).await
    }

    pub async fn open_with(path: &str, options: OpenOptions) -> Result<Self, KbchatError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| KbchatError::Connectivity {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(classify)?;
        let db = Self::setup(conn, options).await?;
        info!(path, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database. Used by tests and dry runs.
    pub async fn open_in_memory() -> Result<Self, KbchatError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(classify)?;
        Self::setup(conn, OpenOptions::default()).await
    }

    async fn setup(
        conn: tokio_rusqlite::Connection,
        options: OpenOptions,
    ) -> Result<Self, KbchatError> {
        conn.call(move |conn| -> Result<(), KbchatError> {
            conn.busy_timeout(options.busy_timeout).map_err(classify)?;
            conn.pragma_update(None, "foreign_keys", true)
                .map_err(classify)?;
            if options.wal_mode {
                let mode: String = conn
                    .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                    .map_err(classify)?;
                debug!(journal_mode = %mode, "journal mode set");
            }
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(classify)?;
            register_functions(conn).map_err(classify)?;
            crate::migrations::run_migrations(conn)
        })
        .await
        .map_err(|e| match e {
            tokio_rusqlite::Error::Error(inner) => inner,
            _ => KbchatError::Connectivity {
                source: "connection closed during setup".into(),
            },
        })?;

        Ok(Self {
            conn,
            cancel: CancellationToken::new(),
        })
    }

    /// The underlying connection, for callers that manage errors themselves.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Returns a handle whose operations stop with [`KbchatError::Cancelled`]
    /// once `token` is cancelled.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            conn: self.conn.clone(),
            cancel: token,
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `function` on the connection thread.
    ///
    /// Work that has not started when the token fires is skipped and reported
    /// as [`KbchatError::Cancelled`]. Work that already started runs to
    /// completion and its real result is returned, so `Cancelled` always
    /// means nothing was executed. Multi-step writes use
    /// [`Database::transaction`].
    pub async fn call<F, R>(&self, function: F) -> Result<R, KbchatError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(KbchatError::Cancelled);
        }

        let token = self.cancel.clone();
        let started = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&started);
        let work = self.conn.call(move |conn| {
            // Mark before checking the token; see the cancelled branch below.
            flag.store(true, Ordering::SeqCst);
            if token.is_cancelled() {
                return Err(interrupted());
            }
            function(conn)
        });
        let mut work = std::pin::pin!(work);

        tokio::select! {
            result = &mut work => result.map_err(map_tr_err),
            () = self.cancel.cancelled() => {
                if started.load(Ordering::SeqCst) {
                    work.await.map_err(map_tr_err)
                } else {
                    Err(KbchatError::Cancelled)
                }
            }
        }
    }

    /// Close the connection, waiting for queued statements to finish.
    pub async fn close(self) -> Result<(), KbchatError> {
        self.conn.close().await.map_err(map_tr_err)?;
        debug!("database closed");
        Ok(())
    }
}

/// Scalar functions available to every statement.
///
/// `casefold(text)` lowercases with Unicode rules; SQLite's own `LIKE` and
/// `lower()` only fold ASCII.
pub(crate) fn register_functions(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

/// The error a statement reports when it was interrupted before running.
pub(crate) fn interrupted() -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_INTERRUPT),
        None,
    )
}

/// Convert a tokio-rusqlite error into a [`KbchatError`].
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> KbchatError {
    match e {
        tokio_rusqlite::Error::Error(inner) => classify(inner),
        tokio_rusqlite::Error::ConnectionClosed => KbchatError::Connectivity {
            source: "database connection closed".into(),
        },
        other => KbchatError::Connectivity {
            source: other.to_string().into(),
        },
    }
}

/// Classify a rusqlite error by its SQLite result code.
pub(crate) fn classify(e: rusqlite::Error) -> KbchatError {
    match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => KbchatError::ConstraintViolation {
            source: Box::new(e),
        },
        Some(ErrorCode::OperationInterrupted) => KbchatError::Cancelled,
        Some(
            ErrorCode::CannotOpen
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::NotADatabase,
        ) => KbchatError::Connectivity {
            source: Box::new(e),
        },
        _ => KbchatError::Storage {
            source: Box::new(e),
        },
    }
}
