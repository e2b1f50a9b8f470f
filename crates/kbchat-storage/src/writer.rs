// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! All-or-nothing writes.
//!
//! Every write in kbchat-storage runs on the single background thread owned
//! by [`Database`]. Multi-statement writes go through
//! [`Database::transaction`], which commits only if every statement succeeded
//! and the caller has not cancelled.

use kbchat_core::KbchatError;
use rusqlite::{ErrorCode, TransactionBehavior};

use crate::database::{Database, interrupted};

impl Database {
    /// Run `function` inside an immediate transaction.
    ///
    /// Any error returned by `function` rolls the transaction back. The
    /// cancellation token is checked when the transaction begins and again
    /// right before commit; a [`KbchatError::Cancelled`] result therefore
    /// always means nothing was written.
    ///
    /// Failures surface as [`KbchatError::TransactionAborted`] carrying the
    /// original error, except cancellation and a closed connection.
    pub async fn transaction<F, R>(&self, function: F) -> Result<R, KbchatError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        if self.cancellation().is_cancelled() {
            return Err(KbchatError::Cancelled);
        }

        let token = self.cancellation().clone();
        self.connection()
            .call(move |conn| {
                if token.is_cancelled() {
                    return Err(interrupted());
                }
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let value = function(&tx)?;
                if token.is_cancelled() {
                    // Dropping `tx` rolls back.
                    return Err(interrupted());
                }
                tx.commit()?;
                Ok(value)
            })
            .await
            .map_err(map_tx_err)
    }
}

fn map_tx_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> KbchatError {
    match e {
        tokio_rusqlite::Error::Error(inner)
            if inner.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) =>
        {
            KbchatError::Cancelled
        }
        tokio_rusqlite::Error::Error(inner) => KbchatError::TransactionAborted {
            source: Box::new(inner),
        },
        other => crate::database::map_tr_err(other),
    }
}
