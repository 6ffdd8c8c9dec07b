//! Reconciliation engine.
//!
//! Walks a batch in input order, one storage call at a time, and reports how
//! many rows it actually changed. Failures abort the rest of the batch and
//! reach the caller unchanged.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, SyncError};
use crate::store::{ConditionalUpdate, Keyed, RecordStore};

#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    call_timeout: Option<Duration>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Reconciler {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            call_timeout: Some(call_timeout),
        }
    }

    /// No per-call deadline.
    pub fn unbounded() -> Self {
        Self { call_timeout: None }
    }

    /// Insert every record whose key is not stored yet. Returns the number
    /// inserted.
    pub async fn insert_missing<R, S>(&self, store: &S, batch: &[R]) -> Result<usize>
    where
        R: Keyed + Send + Sync,
        S: RecordStore<R> + ?Sized,
    {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut count = 0;
        for record in batch {
            let inserted = self
                .bounded("insert_if_absent", store.insert_if_absent(record))
                .await?;
            if inserted.is_some() {
                count += 1;
            } else {
                debug!("Skipping existing record {:?}", record.key());
            }
        }
        Ok(count)
    }

    /// Apply each record through the store's guarded update. Returns the
    /// number of rows the guard let through.
    pub async fn apply_updates<R, S>(&self, store: &S, batch: &[R]) -> Result<usize>
    where
        R: Keyed + Send + Sync,
        S: ConditionalUpdate<R> + ?Sized,
    {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut count = 0;
        for record in batch {
            let updated = self
                .bounded("update_if_mutable", store.update_if_mutable(record))
                .await?;
            if updated.is_some() {
                count += 1;
            } else {
                debug!("No mutable row for {:?}", record.key());
            }
        }
        Ok(count)
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.call_timeout {
            Some(after) => tokio::time::timeout(after, call)
                .await
                .map_err(|_| SyncError::Timeout { operation, after })?,
            None => call.await,
        }
    }
}
