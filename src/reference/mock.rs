//! Scripted reference driver and quote builder for tests.
//!
//! Lets pipeline tests run without the bridge: replies are queued per match
//! and fall back to a standing set of quotes.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::ReferenceError;
use crate::lease::Account;
use crate::market::Side;

use super::driver::ReferenceDriver;
use super::types::{Horizon, ReferenceQuote, ReferenceQuoteSnapshot};

/// One queued reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Return these quotes.
    Quotes(Vec<ReferenceQuote>),
    /// Fail with a transient error.
    Fail(String),
    /// Report the session as stale.
    Stale,
}

/// Session handle issued by [`ScriptedDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedSession {
    /// Account used to open the session.
    pub account_id: u64,
    /// Sequence number of the open call.
    pub serial: usize,
}

#[derive(Debug, Default)]
struct Script {
    queued: HashMap<String, VecDeque<ScriptedReply>>,
    standing: HashMap<String, Vec<ReferenceQuote>>,
    requests: Vec<(String, Horizon)>,
}

/// In-memory [`ReferenceDriver`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    script: Arc<Mutex<Script>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedDriver {
    /// Create an empty driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Quotes returned for `match_ref` whenever nothing is queued.
    pub fn set_quotes(&self, match_ref: &str, quotes: Vec<ReferenceQuote>) {
        lock(&self.script)
            .standing
            .insert(match_ref.to_string(), quotes);
    }

    /// Queue a one-off reply for `match_ref`.
    pub fn push_reply(&self, match_ref: &str, reply: ScriptedReply) {
        lock(&self.script)
            .queued
            .entry(match_ref.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Sessions opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Sessions closed so far.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Every snapshot request made, in order.
    pub fn requests(&self) -> Vec<(String, Horizon)> {
        lock(&self.script).requests.clone()
    }
}

#[async_trait]
impl ReferenceDriver for ScriptedDriver {
    type Session = ScriptedSession;

    async fn open(&self, account: &Account) -> Result<ScriptedSession, ReferenceError> {
        let serial = self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedSession {
            account_id: account.id,
            serial,
        })
    }

    async fn fetch_snapshot(
        &self,
        _session: &ScriptedSession,
        match_ref: &str,
        horizon: Horizon,
    ) -> Result<ReferenceQuoteSnapshot, ReferenceError> {
        let mut script = lock(&self.script);
        script.requests.push((match_ref.to_string(), horizon));
        let reply = script
            .queued
            .get_mut(match_ref)
            .and_then(VecDeque::pop_front);
        let quotes = match reply {
            Some(ScriptedReply::Quotes(q)) => q,
            Some(ScriptedReply::Fail(msg)) => return Err(ReferenceError::Transient(msg)),
            Some(ScriptedReply::Stale) => return Err(ReferenceError::StaleSession),
            None => script.standing.get(match_ref).cloned().unwrap_or_default(),
        };
        Ok(ReferenceQuoteSnapshot {
            match_ref: match_ref.to_string(),
            fetched_at: OffsetDateTime::now_utc(),
            quotes,
        })
    }

    async fn close(&self, _session: ScriptedSession) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Builder for [`ReferenceQuote`] rows in the site's field layout.
#[derive(Debug, Clone, Default)]
pub struct QuoteBuilder {
    quote: ReferenceQuote,
}

impl QuoteBuilder {
    /// Goal-category row.
    pub fn goal() -> Self {
        Self::category(0)
    }

    /// Corner-category row.
    pub fn corner() -> Self {
        Self::category(146)
    }

    /// Row for an arbitrary category id.
    pub fn category(id: u32) -> Self {
        let mut quote = ReferenceQuote::default();
        quote.set("ptype_id", id.to_string());
        Self { quote }
    }

    /// Team and league names.
    pub fn teams(mut self, league: &str, home: &str, away: &str) -> Self {
        self.quote.set("league", league);
        self.quote.set("lid", format!("L-{league}"));
        self.quote.set("team_h", home);
        self.quote.set("team_id_h", format!("T-{home}"));
        self.quote.set("team_c", away);
        self.quote.set("team_id_c", format!("T-{away}"));
        self
    }

    /// Full-match handicap.
    pub fn full_handicap(self, line: &str, favored: Side, home: &str, away: &str) -> Self {
        self.handicap(["sw_R", "ratio", "strong", "ior_RH", "ior_RC"], line, favored, home, away)
    }

    /// First-half handicap.
    pub fn first_half_handicap(self, line: &str, favored: Side, home: &str, away: &str) -> Self {
        self.handicap(["sw_HR", "hratio", "hstrong", "ior_HRH", "ior_HRC"], line, favored, home, away)
    }

    /// Full-match total, `under` price first.
    pub fn full_total(self, line: &str, under: &str, over: &str) -> Self {
        self.total(["sw_OU", "ratio_o", "ior_OUH", "ior_OUC"], line, under, over)
    }

    /// First-half total, `under` price first.
    pub fn first_half_total(self, line: &str, under: &str, over: &str) -> Self {
        self.total(["sw_HOU", "ratio_ho", "ior_HOUH", "ior_HOUC"], line, under, over)
    }

    /// Set an arbitrary raw field.
    pub fn field(mut self, key: &str, value: &str) -> Self {
        self.quote.set(key, value);
        self
    }

    /// Finish the row.
    pub fn build(self) -> ReferenceQuote {
        self.quote
    }

    fn handicap(
        mut self,
        keys: [&str; 5],
        line: &str,
        favored: Side,
        home: &str,
        away: &str,
    ) -> Self {
        let strong = match favored {
            Side::Home => "H",
            Side::Away => "C",
        };
        self.quote.set(keys[0], "Y");
        self.quote.set(keys[1], line);
        self.quote.set(keys[2], strong);
        self.quote.set(keys[3], home);
        self.quote.set(keys[4], away);
        self
    }

    fn total(mut self, keys: [&str; 4], line: &str, under: &str, over: &str) -> Self {
        self.quote.set(keys[0], "Y");
        self.quote.set(keys[1], line);
        self.quote.set(keys[2], under);
        self.quote.set(keys[3], over);
        self
    }
}
