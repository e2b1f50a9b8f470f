// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the store traits.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use kbchat_config::model::StorageConfig;
use kbchat_core::{
    Conversation, ConversationDetail, ConversationListFilter, ConversationListItem,
    ConversationMessage, ConversationReference, ConversationStore, DistributionEntry,
    FeedbackInfo, FeedbackRequest, HealthStatus, KbchatError, StorageAdapter,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed conversation store.
///
/// The database is opened lazily by [`StorageAdapter::initialize`]. Cloned
/// stores share the connection; [`SqliteConversationStore::with_cancellation`]
/// scopes a clone to one request.
#[derive(Clone)]
pub struct SqliteConversationStore {
    config: StorageConfig,
    db: Arc<OnceCell<Database>>,
    cancel: CancellationToken,
}

impl SqliteConversationStore {
    /// The connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: Arc::new(OnceCell::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Wrap an already opened database.
    pub fn from_database(db: Database) -> Self {
        Self {
            config: StorageConfig::default(),
            db: Arc::new(OnceCell::from(db)),
            cancel: CancellationToken::new(),
        }
    }

    /// A handle whose operations fail with [`KbchatError::Cancelled`] once
    /// `token` fires.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            config: self.config.clone(),
            db: Arc::clone(&self.db),
            cancel: token,
        }
    }

    /// The database handle, scoped to this store's cancellation token.
    pub fn db(&self) -> Result<Database, KbchatError> {
        self.db
            .get()
            .map(|db| db.with_cancellation(self.cancel.clone()))
            .ok_or_else(|| KbchatError::Connectivity {
                source: "storage not initialized, call initialize() first".into(),
            })
    }
}

#[async_trait]
impl StorageAdapter for SqliteConversationStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn initialize(&self) -> Result<(), KbchatError> {
        let db = Database::open_with_config(&self.config).await?;
        self.db.set(db).map_err(|_| KbchatError::Internal(
            "storage already initialized".into(),
        ))?;
        info!(path = %self.config.database_path, "SQLite conversation store initialized");
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus, KbchatError> {
        let db = match self.db() {
            Ok(db) => db,
            Err(e) => return Ok(HealthStatus::Unhealthy(e.to_string())),
        };
        let quick_check = db
            .call(|conn| conn.query_row("PRAGMA quick_check", [], |row| row.get::<_, String>(0)))
            .await;
        Ok(match quick_check {
            Ok(result) if result == "ok" => HealthStatus::Healthy,
            Ok(result) => HealthStatus::Degraded(result),
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn close(&self) -> Result<(), KbchatError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), KbchatError> {
        queries::conversations::create_conversation(&self.db()?, conversation).await
    }

    async fn create_conversation_message(
        &self,
        message: &ConversationMessage,
        references: &[ConversationReference],
    ) -> Result<(), KbchatError> {
        queries::messages::create_conversation_message(&self.db()?, message, references).await
    }

    async fn get_conversation_list(
        &self,
        filter: &ConversationListFilter,
    ) -> Result<(Vec<ConversationListItem>, u64), KbchatError> {
        queries::conversations::get_conversation_list(&self.db()?, filter).await
    }

    async fn get_conversation_detail(&self, id: &str) -> Result<ConversationDetail, KbchatError> {
        queries::conversations::get_conversation_detail(&self.db()?, id).await
    }

    async fn get_conversation_references(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ConversationReference>, KbchatError> {
        queries::references::get_conversation_references(&self.db()?, conversation_id).await
    }

    async fn get_conversation_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ConversationMessage>, KbchatError> {
        queries::messages::get_conversation_messages(&self.db()?, conversation_id).await
    }

    async fn validate_conversation_nonce(&self, id: &str, nonce: &str) -> Result<(), KbchatError> {
        queries::conversations::validate_conversation_nonce(&self.db()?, id, nonce).await
    }

    async fn get_message_detail(
        &self,
        message_id: &str,
    ) -> Result<ConversationMessage, KbchatError> {
        queries::messages::get_message_detail(&self.db()?, message_id).await
    }

    async fn update_message_feedback(
        &self,
        feedback: &FeedbackRequest,
    ) -> Result<(), KbchatError> {
        queries::feedback::update_message_feedback(&self.db()?, feedback).await
    }

    async fn get_feedback_by_conversation_ids(
        &self,
        conversation_ids: &[String],
    ) -> Result<HashMap<String, FeedbackInfo>, KbchatError> {
        queries::feedback::get_feedback_by_conversation_ids(&self.db()?, conversation_ids).await
    }

    async fn get_conversation_distribution(
        &self,
        kb_id: &str,
    ) -> Result<Vec<DistributionEntry>, KbchatError> {
        queries::stats::get_conversation_distribution(&self.db()?, kb_id).await
    }

    async fn get_conversation_count(&self, kb_id: &str) -> Result<u64, KbchatError> {
        queries::stats::get_conversation_count(&self.db()?, kb_id).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), KbchatError> {
        queries::conversations::delete_conversation(&self.db()?, id).await
    }
}
