//! Account lease pool with background heartbeat.

use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::LeaseError;
use crate::metrics;

use super::store::{Account, AccountRow, LeaseStore};

/// An account leased to this worker. Dropping it stops the heartbeat but
/// leaves the row leased until [`AccountLeasePool::release`] or expiry.
#[derive(Debug)]
pub struct Lease {
    /// Leased credentials.
    pub account: Account,
    /// Lease expiry at acquisition time.
    pub expires_at: OffsetDateTime,
    heartbeat: Option<JoinHandle<()>>,
}

impl Lease {
    /// Whether the heartbeat task is still running.
    pub fn is_renewing(&self) -> bool {
        self.heartbeat.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
    }
}

/// Leases scraping accounts to one worker.
#[derive(Clone)]
pub struct AccountLeasePool {
    store: Arc<dyn LeaseStore>,
    worker_id: String,
    ttl: Duration,
}

impl std::fmt::Debug for AccountLeasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountLeasePool")
            .field("worker_id", &self.worker_id)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl AccountLeasePool {
    /// Create a pool for `worker_id`.
    pub fn new(store: Arc<dyn LeaseStore>, worker_id: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            worker_id: worker_id.into(),
            ttl,
        }
    }

    /// This worker's identity.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Heartbeat period: TTL / 2.5.
    pub fn heartbeat_interval(&self) -> Duration {
        self.ttl * 2 / 5
    }

    /// Lease an account and start renewing it.
    pub async fn acquire(&self) -> Result<Lease, LeaseError> {
        let account = self.acquire_at(OffsetDateTime::now_utc()).await?;
        let expires_at = OffsetDateTime::now_utc() + self.ttl;
        let heartbeat = self.spawn_heartbeat(account.id);
        Ok(Lease {
            account,
            expires_at,
            heartbeat: Some(heartbeat),
        })
    }

    /// Lease an account as of `now`, without starting a heartbeat.
    ///
    /// Re-affirms a lease this worker already holds, otherwise picks a random
    /// free or lapsed account.
    #[instrument(skip(self), fields(worker = %self.worker_id))]
    pub async fn acquire_at(&self, now: OffsetDateTime) -> Result<Account, LeaseError> {
        let mut tx = self.store.begin().await?;
        let expires = now + self.ttl;

        let row = match tx.held_by(&self.worker_id).await? {
            Some(row) => {
                debug!(account_id = row.account.id, "Re-affirming held lease");
                row
            }
            None => {
                let candidates = tx.claimable(now).await?;
                pick_random(&candidates).ok_or(LeaseError::NoAccountAvailable)?
            }
        };

        tx.assign(row.account.id, &self.worker_id, expires).await?;
        tx.commit().await?;

        metrics::inc_leases_acquired();
        info!(account_id = row.account.id, expires = %expires, "Account leased");
        Ok(row.account)
    }

    /// Push out this worker's lease on `account_id`. Returns false if it was lost.
    pub async fn renew(&self, account_id: u64) -> Result<bool, LeaseError> {
        self.store
            .renew(
                account_id,
                &self.worker_id,
                OffsetDateTime::now_utc() + self.ttl,
            )
            .await
    }

    /// Stop renewing `lease` and clear every lease held by this worker.
    pub async fn release(&self, mut lease: Lease) -> Result<(), LeaseError> {
        if let Some(handle) = lease.heartbeat.take() {
            handle.abort();
        }
        self.release_all().await
    }

    /// Clear every lease held by this worker. Safe to call repeatedly.
    pub async fn release_all(&self) -> Result<(), LeaseError> {
        let released = self.store.release(&self.worker_id).await?;
        if released > 0 {
            info!(worker = %self.worker_id, released, "Account lease released");
        }
        Ok(())
    }

    fn spawn_heartbeat(&self, account_id: u64) -> JoinHandle<()> {
        let pool = self.clone();
        let period = self.heartbeat_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match pool.renew(account_id).await {
                    Ok(true) => debug!(account_id, "Lease renewed"),
                    Ok(false) => {
                        warn!(account_id, "Lease lost, stopping heartbeat");
                        break;
                    }
                    Err(e) => warn!(account_id, error = %e, "Lease renewal failed"),
                }
            }
        })
    }
}

fn pick_random(rows: &[AccountRow]) -> Option<AccountRow> {
    rows.choose(&mut rand::thread_rng()).cloned()
}
