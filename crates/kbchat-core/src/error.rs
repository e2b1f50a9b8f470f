// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for conversation persistence.

use strum::Display;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The error type returned by every store operation.
///
/// Store failures keep the backend error as `source`; this layer classifies
/// but never rewrites or retries them.
#[derive(Debug, Error)]
pub enum KbchatError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// A single-row lookup matched nothing.
    ///
    /// Nonce validation reports this for both an unknown id and a wrong nonce.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// An insert violated a uniqueness or foreign-key constraint.
    #[error("constraint violation: {source}")]
    ConstraintViolation { source: BoxError },

    /// The store could not be reached, was closed, or a statement timed out.
    #[error("store unavailable: {source}")]
    Connectivity { source: BoxError },

    /// A statement inside a transaction failed and the transaction was rolled back.
    #[error("transaction aborted: {source}")]
    TransactionAborted { source: BoxError },

    /// Any other storage backend error (query failure, row decoding).
    #[error("storage error: {source}")]
    Storage { source: BoxError },

    /// The caller cancelled the operation before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`KbchatError`], for callers that translate
/// errors into responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Config,
    NotFound,
    ConstraintViolation,
    Connectivity,
    TransactionAborted,
    Storage,
    Cancelled,
    Internal,
}

impl KbchatError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KbchatError::Config(_) => ErrorKind::Config,
            KbchatError::NotFound { .. } => ErrorKind::NotFound,
            KbchatError::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
            KbchatError::Connectivity { .. } => ErrorKind::Connectivity,
            KbchatError::TransactionAborted { .. } => ErrorKind::TransactionAborted,
            KbchatError::Storage { .. } => ErrorKind::Storage,
            KbchatError::Cancelled => ErrorKind::Cancelled,
            KbchatError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
