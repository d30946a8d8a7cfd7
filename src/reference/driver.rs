//! Boundary to whatever drives the reference site.

use async_trait::async_trait;

use crate::error::ReferenceError;
use crate::lease::Account;

use super::types::{Horizon, ReferenceQuoteSnapshot};

/// Logs in to the reference site and pulls quote snapshots.
///
/// Implementations own the browser or HTTP mechanics. Session lifetime is
/// managed by [`super::SessionManager`].
#[async_trait]
pub trait ReferenceDriver: Send + Sync {
    /// Handle to a logged-in session.
    type Session: Send + Sync;

    /// Log in with `account`.
    async fn open(&self, account: &Account) -> Result<Self::Session, ReferenceError>;

    /// Current quotes for `match_ref` from the `horizon` listing.
    async fn fetch_snapshot(
        &self,
        session: &Self::Session,
        match_ref: &str,
        horizon: Horizon,
    ) -> Result<ReferenceQuoteSnapshot, ReferenceError>;

    /// Log out and free local resources. Must not fail.
    async fn close(&self, session: Self::Session);
}
