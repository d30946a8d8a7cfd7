//! Single-owner reference-site session built on a leased account.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::error::ReferenceError;
use crate::lease::{AccountLeasePool, Lease};
use crate::metrics;
use crate::schedule::with_retries;

use super::driver::ReferenceDriver;
use super::types::{Horizon, ReferenceQuoteSnapshot};

struct ActiveSession<S> {
    handle: S,
    lease: Lease,
    last_used: Instant,
}

/// Owns at most one logged-in session and the lease behind it.
///
/// States: closed, or open with a lease. An open session idle for longer than
/// `idle_limit` is closed and reopened before its next use.
pub struct SessionManager<D: ReferenceDriver> {
    driver: Arc<D>,
    pool: AccountLeasePool,
    active: Option<ActiveSession<D::Session>>,
    idle_limit: Duration,
    attempts: u32,
}

impl<D: ReferenceDriver> SessionManager<D> {
    /// Create a closed session manager.
    pub fn new(driver: Arc<D>, pool: AccountLeasePool, idle_limit: Duration, attempts: u32) -> Self {
        Self {
            driver,
            pool,
            active: None,
            idle_limit,
            attempts,
        }
    }

    /// Whether a session is currently open.
    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    /// Id of the leased account, if any.
    pub fn account_id(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.lease.account.id)
    }

    /// Fresh snapshot for `match_ref`, retrying with a full reset between attempts.
    ///
    /// A missing account is reported straight away so the caller can wait for
    /// its next tick.
    #[instrument(skip(self), fields(worker = %self.pool.worker_id()))]
    pub async fn fetch_snapshot(
        &mut self,
        match_ref: &str,
        horizon: Horizon,
    ) -> Result<ReferenceQuoteSnapshot, ReferenceError> {
        self.ensure_open().await?;

        let attempts = self.attempts;
        with_retries(
            attempts,
            self,
            |s| Box::pin(s.reset()),
            |s| {
                let match_ref = match_ref.to_string();
                Box::pin(async move { s.try_fetch(&match_ref, horizon).await })
            },
        )
        .await
        .into_result(|attempts, e| {
            metrics::inc_snapshot_failures();
            ReferenceError::RetriesExhausted {
                attempts,
                last: e.to_string(),
            }
        })
    }

    /// Close the session and give the account back.
    pub async fn reset(&mut self) {
        if let Some(active) = self.active.take() {
            self.driver.close(active.handle).await;
            if let Err(e) = self.pool.release(active.lease).await {
                warn!(error = %e, "Failed to release account lease");
            }
        }
    }

    async fn try_fetch(
        &mut self,
        match_ref: &str,
        horizon: Horizon,
    ) -> Result<ReferenceQuoteSnapshot, ReferenceError> {
        match self.fetch_once(match_ref, horizon).await {
            Err(ReferenceError::StaleSession) => {
                info!("Session reported stale, rebuilding");
                self.reset().await;
                self.fetch_once(match_ref, horizon).await
            }
            other => other,
        }
    }

    async fn fetch_once(
        &mut self,
        match_ref: &str,
        horizon: Horizon,
    ) -> Result<ReferenceQuoteSnapshot, ReferenceError> {
        self.ensure_open().await?;
        let Some(active) = self.active.as_mut() else {
            return Err(ReferenceError::StaleSession);
        };
        let snapshot = {
            let _timer = metrics::timer_snapshot_fetch();
            self.driver
                .fetch_snapshot(&active.handle, match_ref, horizon)
                .await?
        };
        active.last_used = Instant::now();
        Ok(snapshot)
    }

    async fn ensure_open(&mut self) -> Result<(), ReferenceError> {
        if let Some(active) = &self.active {
            if active.last_used.elapsed() < self.idle_limit {
                return Ok(());
            }
            info!(idle_secs = active.last_used.elapsed().as_secs(), "Session idle too long, rebuilding");
            self.reset().await;
        }

        let lease = self.pool.acquire().await?;
        match self.driver.open(&lease.account).await {
            Ok(handle) => {
                info!(account_id = lease.account.id, "Reference session opened");
                self.active = Some(ActiveSession {
                    handle,
                    lease,
                    last_used: Instant::now(),
                });
                Ok(())
            }
            Err(e) => {
                if let Err(release_err) = self.pool.release(lease).await {
                    warn!(error = %release_err, "Failed to release account lease");
                }
                Err(e)
            }
        }
    }
}

impl<D: ReferenceDriver> Drop for SessionManager<D> {
    fn drop(&mut self) {
        if self.active.is_some() {
            warn!("Session manager dropped with an open session; lease will lapse on its own");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::{Account, MemoryLeaseStore};
    use crate::reference::mock::{QuoteBuilder, ScriptedDriver, ScriptedReply};
    use crate::error::LeaseError;

    fn manager(accounts: u64) -> (SessionManager<ScriptedDriver>, ScriptedDriver, MemoryLeaseStore) {
        let store = MemoryLeaseStore::new((1..=accounts).map(|id| Account {
            id,
            username: format!("u{id}"),
            password: "p".into(),
        }));
        let pool = AccountLeasePool::new(Arc::new(store.clone()), "w1", Duration::from_secs(300));
        let driver = ScriptedDriver::new();
        driver.set_quotes("m1", vec![QuoteBuilder::goal().build()]);
        let mgr = SessionManager::new(Arc::new(driver.clone()), pool, Duration::from_secs(900), 3);
        (mgr, driver, store)
    }

    #[tokio::test]
    async fn reuses_open_session() {
        let (mut mgr, driver, _store) = manager(1);
        mgr.fetch_snapshot("m1", Horizon::NearTerm).await.unwrap();
        mgr.fetch_snapshot("m1", Horizon::NearTerm).await.unwrap();
        assert_eq!(driver.opened(), 1);
        assert_eq!(mgr.account_id(), Some(1));
        mgr.reset().await;
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_is_rebuilt() {
        let (mut mgr, driver, _store) = manager(1);
        mgr.fetch_snapshot("m1", Horizon::NearTerm).await.unwrap();
        tokio::time::advance(Duration::from_secs(901)).await;
        mgr.fetch_snapshot("m1", Horizon::NearTerm).await.unwrap();
        assert_eq!(driver.opened(), 2);
        assert_eq!(driver.closed(), 1);
        mgr.reset().await;
    }

    #[tokio::test]
    async fn transient_failure_resets_and_retries() {
        let (mut mgr, driver, _store) = manager(1);
        driver.push_reply("m1", ScriptedReply::Fail("timeout".into()));
        let snap = mgr.fetch_snapshot("m1", Horizon::NearTerm).await.unwrap();
        assert_eq!(snap.quotes.len(), 1);
        assert_eq!(driver.opened(), 2);
        assert_eq!(driver.closed(), 1);
        mgr.reset().await;
    }

    #[tokio::test]
    async fn gives_up_after_three_attempts() {
        let (mut mgr, driver, _store) = manager(1);
        for _ in 0..3 {
            driver.push_reply("m1", ScriptedReply::Fail("down".into()));
        }
        let err = mgr.fetch_snapshot("m1", Horizon::NearTerm).await.unwrap_err();
        assert!(matches!(err, ReferenceError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(driver.opened(), 3);
        assert_eq!(driver.closed(), 2);
        mgr.reset().await;
    }

    #[tokio::test]
    async fn stale_session_rebuilds_within_one_attempt() {
        let (mut mgr, driver, _store) = manager(1);
        driver.push_reply("m1", ScriptedReply::Stale);
        mgr.fetch_snapshot("m1", Horizon::FarTerm).await.unwrap();
        assert_eq!(driver.opened(), 2);
        assert_eq!(driver.requests().len(), 2);
        mgr.reset().await;
    }

    #[tokio::test]
    async fn missing_account_surfaces_immediately() {
        let (mut mgr, driver, _store) = manager(0);
        let err = mgr.fetch_snapshot("m1", Horizon::NearTerm).await.unwrap_err();
        assert!(matches!(err, ReferenceError::Lease(LeaseError::NoAccountAvailable)));
        assert_eq!(driver.opened(), 0);
    }

    #[tokio::test]
    async fn reset_releases_lease() {
        let (mut mgr, _driver, store) = manager(1);
        mgr.fetch_snapshot("m1", Horizon::NearTerm).await.unwrap();
        assert_eq!(store.rows().await[0].leased_by.as_deref(), Some("w1"));
        mgr.reset().await;
        assert!(!mgr.is_open());
        assert_eq!(store.rows().await[0].leased_by, None);
    }
}
