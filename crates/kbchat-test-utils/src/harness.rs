// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for store-level integration testing.
//!
//! `TestHarness` opens a [`SqliteConversationStore`] over a temporary SQLite
//! file and exposes the raw [`Database`] for seeding rows the store itself
//! never writes, such as applications.

use kbchat_config::model::StorageConfig;
use kbchat_core::{KbchatError, StorageAdapter};
use kbchat_storage::{Database, SqliteConversationStore};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    wal_mode: bool,
    busy_timeout_ms: u64,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            wal_mode: true,
            busy_timeout_ms: 1_000,
        }
    }

    pub fn with_wal(mut self, enabled: bool) -> Self {
        self.wal_mode = enabled;
        self
    }

    pub fn with_busy_timeout_ms(mut self, ms: u64) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    /// Create the temp directory and initialize the store.
    pub async fn build(self) -> Result<TestHarness, KbchatError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| KbchatError::Connectivity {
            source: Box::new(e),
        })?;
        let db_path = temp_dir.path().join("kbchat-test.db");

        let config = StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            wal_mode: self.wal_mode,
            busy_timeout_ms: self.busy_timeout_ms,
        };
        let store = SqliteConversationStore::new(config.clone());
        store.initialize().await?;
        let db = store.db()?;

        Ok(TestHarness {
            store,
            db,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// An initialized store backed by a temp file, removed on drop.
pub struct TestHarness {
    pub store: SqliteConversationStore,
    /// Raw handle on the same connection as `store`.
    pub db: Database,
    pub config: StorageConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default options.
    pub async fn new() -> Result<Self, KbchatError> {
        Self::builder().build().await
    }

    /// Insert an application row for listing joins.
    pub async fn seed_app(
        &self,
        id: &str,
        kb_id: &str,
        name: &str,
        app_type: &str,
    ) -> Result<(), KbchatError> {
        let (id, kb_id, name, app_type) = (
            id.to_string(),
            kb_id.to_string(),
            name.to_string(),
            app_type.to_string(),
        );
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO apps (id, kb_id, name, app_type) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![id, kb_id, name, app_type],
                )
            })
            .await?;
        Ok(())
    }

    /// Count rows in one of the conversation tables.
    pub async fn count_rows(&self, table: &'static str) -> Result<u64, KbchatError> {
        let n: i64 = self
            .db
            .call(move |conn| {
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            })
            .await?;
        Ok(u64::try_from(n).unwrap_or_default())
    }
}
