//! Delayed resync queue
//!
//! After a write or revocation against the ledger, the index needs a
//! moment before the attestation is queryable. Resync tasks are persisted
//! through the store so delivery is at least once across restarts: the
//! worker polls for due tasks, runs the single-record sync, deletes on
//! success, and re-enqueues failures with a delay until the attempt bound.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use docket_core::{AttestationId, ResyncTask};
use docket_store::CacheStore;

use crate::config::SyncConfig;
use crate::engine::ReconcileEngine;
use crate::error::SyncResult;

pub struct ResyncQueue {
    store: Arc<dyn CacheStore>,
    engine: Arc<ReconcileEngine>,
    delay_secs: u64,
    poll_secs: u64,
    max_attempts: u32,
}

impl ResyncQueue {
    pub fn new(engine: Arc<ReconcileEngine>, config: &SyncConfig) -> Self {
        let store = engine.store().clone();
        Self {
            store,
            engine,
            delay_secs: config.resync_delay_secs,
            poll_secs: config.resync_poll_secs,
            max_attempts: config.max_resync_attempts,
        }
    }

    /// Persist a single resync task due after `delay`.
    pub async fn enqueue(&self, id: &AttestationId, delay: Duration) -> SyncResult<()> {
        let task = ResyncTask::new(id.clone(), delay);
        self.store.enqueue_resync(&task).await?;
        Ok(())
    }

    /// Post-write convention: one immediate task plus one delayed task
    /// to absorb index lag.
    pub async fn enqueue_follow_up(&self, id: &AttestationId) -> SyncResult<()> {
        self.enqueue(id, Duration::zero()).await?;
        self.enqueue(id, Duration::seconds(self.delay_secs as i64))
            .await?;
        Ok(())
    }

    /// Process every due task once. Returns how many completed.
    pub async fn drain_due(&self) -> SyncResult<usize> {
        let due = self.store.due_resyncs(Utc::now()).await?;
        let mut completed = 0;
        for task in due {
            match self.engine.sync_one(&task.attestation_id).await {
                Ok(outcome) => {
                    debug!(
                        attestation_id = %task.attestation_id,
                        ?outcome,
                        "Resync task completed"
                    );
                    self.store.delete_resync(&task.task_id).await?;
                    completed += 1;
                }
                Err(e) => {
                    let attempts = task.attempts + 1;
                    if attempts >= self.max_attempts {
                        warn!(
                            attestation_id = %task.attestation_id,
                            attempts,
                            error = %e,
                            "Dropping resync task after repeated failures"
                        );
                        self.store.delete_resync(&task.task_id).await?;
                    } else {
                        // Persist the retry before removing the old
                        // task: an abort between the two leaves a
                        // duplicate, never a lost task.
                        let mut retry = ResyncTask::new(
                            task.attestation_id.clone(),
                            Duration::seconds(self.delay_secs as i64),
                        );
                        retry.attempts = attempts;
                        self.store.enqueue_resync(&retry).await?;
                        if retry.task_id != task.task_id {
                            self.store.delete_resync(&task.task_id).await?;
                        }
                    }
                }
            }
        }
        Ok(completed)
    }

    /// Spawn the polling worker.
    pub fn spawn_worker(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(self.poll_secs.max(1)));
            loop {
                ticker.tick().await;
                if let Err(e) = self.drain_due().await {
                    warn!(error = %e, "Resync drain failed");
                }
            }
        })
    }
}
