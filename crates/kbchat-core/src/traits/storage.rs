// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;

use crate::error::KbchatError;
use crate::types::HealthStatus;

/// Lifecycle of a storage backend.
///
/// Backends are constructed cheaply and opened with [`initialize`](Self::initialize);
/// every store operation before that fails with a storage error.
#[async_trait]
pub trait StorageAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this backend.
    fn name(&self) -> &str;

    /// Returns the semantic version of this backend.
    fn version(&self) -> semver::Version;

    /// Opens the backend and applies pending schema migrations.
    async fn initialize(&self) -> Result<(), KbchatError>;

    /// Performs a health check and returns the backend's current status.
    async fn health_check(&self) -> Result<HealthStatus, KbchatError>;

    /// Flushes pending writes and releases the backend.
    async fn close(&self) -> Result<(), KbchatError>;
}
