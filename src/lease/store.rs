//! Lease storage: a transactional trait and an in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::LeaseError;

/// Credentials for one reference-site account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Row id.
    pub id: u64,
    /// Login name.
    pub username: String,
    /// Login password.
    pub password: String,
}

/// An account row together with its lease columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRow {
    /// Credentials.
    pub account: Account,
    /// Disabled accounts are never leased.
    pub enabled: bool,
    /// Worker currently holding the lease.
    pub leased_by: Option<String>,
    /// When the current lease lapses.
    pub lease_expires: Option<OffsetDateTime>,
}

impl AccountRow {
    /// A fresh enabled, unleased row.
    pub fn new(account: Account) -> Self {
        Self {
            account,
            enabled: true,
            leased_by: None,
            lease_expires: None,
        }
    }

    /// Whether a worker other than the holder may take this row at `now`.
    pub fn is_claimable(&self, now: OffsetDateTime) -> bool {
        self.enabled
            && (self.leased_by.is_none() || self.lease_expires.map_or(true, |exp| exp < now))
    }
}

/// Storage backing the lease pool.
///
/// Acquisition runs inside a [`LeaseTransaction`]; rows it reads stay locked
/// against other transactions until it commits or is dropped.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Open a transaction.
    async fn begin(&self) -> Result<Box<dyn LeaseTransaction>, LeaseError>;

    /// Push out the expiry of a lease still owned by `worker`. Returns false if it was lost.
    async fn renew(
        &self,
        account_id: u64,
        worker: &str,
        expires: OffsetDateTime,
    ) -> Result<bool, LeaseError>;

    /// Clear every lease held by `worker`. Returns the number of rows released.
    async fn release(&self, worker: &str) -> Result<usize, LeaseError>;
}

/// Locked view used while acquiring a lease. Dropping without commit discards changes.
#[async_trait]
pub trait LeaseTransaction: Send {
    /// Enabled row currently assigned to `worker`.
    async fn held_by(&mut self, worker: &str) -> Result<Option<AccountRow>, LeaseError>;

    /// Enabled rows that are free or whose lease has lapsed.
    async fn claimable(&mut self, now: OffsetDateTime) -> Result<Vec<AccountRow>, LeaseError>;

    /// Assign `account_id` to `worker` until `expires`.
    async fn assign(
        &mut self,
        account_id: u64,
        worker: &str,
        expires: OffsetDateTime,
    ) -> Result<(), LeaseError>;

    /// Make the changes visible.
    async fn commit(&mut self) -> Result<(), LeaseError>;
}

/// Lease table kept in memory. One transaction at a time holds the table lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryLeaseStore {
    rows: Arc<Mutex<Vec<AccountRow>>>,
}

impl MemoryLeaseStore {
    /// Store seeded with `accounts`, all enabled and free.
    pub fn new(accounts: impl IntoIterator<Item = Account>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(
                accounts.into_iter().map(AccountRow::new).collect(),
            )),
        }
    }

    /// Copy of every row.
    pub async fn rows(&self) -> Vec<AccountRow> {
        self.rows.lock().await.clone()
    }

    /// Enable or disable an account.
    pub async fn set_enabled(&self, account_id: u64, enabled: bool) {
        if let Some(row) = self
            .rows
            .lock()
            .await
            .iter_mut()
            .find(|r| r.account.id == account_id)
        {
            row.enabled = enabled;
        }
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn begin(&self) -> Result<Box<dyn LeaseTransaction>, LeaseError> {
        let guard = self.rows.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryLeaseTransaction { guard, staged }))
    }

    async fn renew(
        &self,
        account_id: u64,
        worker: &str,
        expires: OffsetDateTime,
    ) -> Result<bool, LeaseError> {
        let mut rows = self.rows.lock().await;
        match rows
            .iter_mut()
            .find(|r| r.account.id == account_id && r.leased_by.as_deref() == Some(worker))
        {
            Some(row) => {
                row.lease_expires = Some(expires);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn release(&self, worker: &str) -> Result<usize, LeaseError> {
        let mut rows = self.rows.lock().await;
        let mut released = 0;
        for row in rows
            .iter_mut()
            .filter(|r| r.leased_by.as_deref() == Some(worker))
        {
            row.leased_by = None;
            released += 1;
        }
        Ok(released)
    }
}

struct MemoryLeaseTransaction {
    guard: OwnedMutexGuard<Vec<AccountRow>>,
    staged: Vec<AccountRow>,
}

#[async_trait]
impl LeaseTransaction for MemoryLeaseTransaction {
    async fn held_by(&mut self, worker: &str) -> Result<Option<AccountRow>, LeaseError> {
        Ok(self
            .staged
            .iter()
            .find(|r| r.enabled && r.leased_by.as_deref() == Some(worker))
            .cloned())
    }

    async fn claimable(&mut self, now: OffsetDateTime) -> Result<Vec<AccountRow>, LeaseError> {
        Ok(self
            .staged
            .iter()
            .filter(|r| r.is_claimable(now))
            .cloned()
            .collect())
    }

    async fn assign(
        &mut self,
        account_id: u64,
        worker: &str,
        expires: OffsetDateTime,
    ) -> Result<(), LeaseError> {
        let row = self
            .staged
            .iter_mut()
            .find(|r| r.account.id == account_id)
            .ok_or_else(|| LeaseError::Store(format!("account {account_id} vanished")))?;
        row.leased_by = Some(worker.to_string());
        row.lease_expires = Some(expires);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), LeaseError> {
        *self.guard = self.staged.clone();
        Ok(())
    }
}
