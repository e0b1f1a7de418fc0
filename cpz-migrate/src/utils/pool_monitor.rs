//! Monitored batch transactions
//!
//! Wraps `pool.begin()` so every batch transaction logs how long it waited
//! for a connection and how long it held it. Long holds show up as warnings
//! next to the batch that caused them.

use cpz_common::{Error, Result};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::time::Instant;

/// Hold time above which a transaction is logged at WARN
const LONG_HOLD_MS: u128 = 2000;

/// Wait time above which connection acquisition is logged at WARN
const SLOW_ACQUIRE_MS: u128 = 1000;

/// Transaction wrapper that logs acquisition and release timing
pub struct MonitoredTransaction<'c> {
    tx: Option<Transaction<'c, Sqlite>>,
    caller: &'static str,
    acquired_at: Instant,
}

impl<'c> MonitoredTransaction<'c> {
    fn new(tx: Transaction<'c, Sqlite>, caller: &'static str) -> Self {
        Self {
            tx: Some(tx),
            caller,
            acquired_at: Instant::now(),
        }
    }

    fn take(&mut self) -> Result<Transaction<'c, Sqlite>> {
        self.tx
            .take()
            .ok_or_else(|| Error::Internal(format!("{}: transaction already consumed", self.caller)))
    }

    /// Connection to run statements on inside the transaction
    pub fn conn(&mut self) -> Result<&mut SqliteConnection> {
        let caller = self.caller;
        self.tx
            .as_deref_mut()
            .ok_or_else(|| Error::Internal(format!("{}: transaction already consumed", caller)))
    }

    /// Commit and log hold time
    pub async fn commit(mut self) -> Result<()> {
        let tx = self.take()?;
        tx.commit().await?;
        self.log_release("commit");
        Ok(())
    }

    /// Roll back and log hold time
    pub async fn rollback(mut self) -> Result<()> {
        let tx = self.take()?;
        tx.rollback().await?;
        self.log_release("rollback");
        Ok(())
    }

    fn log_release(&self, how: &'static str) {
        let held_ms = self.acquired_at.elapsed().as_millis();
        if held_ms > LONG_HOLD_MS {
            tracing::warn!(
                caller = self.caller,
                held_ms = held_ms,
                release = how,
                "LONG TRANSACTION - connection held for an extended period"
            );
        } else {
            tracing::debug!(
                caller = self.caller,
                held_ms = held_ms,
                release = how,
                "Connection released"
            );
        }
    }
}

impl<'c> Drop for MonitoredTransaction<'c> {
    fn drop(&mut self) {
        // sqlx rolls back a dropped transaction; only record that it happened
        if self.tx.is_some() {
            self.log_release("drop");
        }
    }
}

/// Begin a transaction with connection pool timing logs
///
/// ```ignore
/// let mut tx = begin_monitored(&pool, "migration_orchestrator::write_batch").await?;
/// zones::insert_zone(tx.conn()?, &row).await?;
/// tx.commit().await?;
/// ```
pub async fn begin_monitored<'c>(
    pool: &'c SqlitePool,
    caller: &'static str,
) -> Result<MonitoredTransaction<'c>> {
    let start = Instant::now();
    tracing::debug!(caller = caller, "Connection acquisition requested");

    let tx = pool.begin().await?;

    let wait_ms = start.elapsed().as_millis();
    if wait_ms > SLOW_ACQUIRE_MS {
        tracing::warn!(
            caller = caller,
            wait_ms = wait_ms,
            "SLOW CONNECTION ACQUISITION - pool may be saturated"
        );
    } else {
        tracing::debug!(caller = caller, wait_ms = wait_ms, "Connection acquired");
    }

    Ok(MonitoredTransaction::new(tx, caller))
}
