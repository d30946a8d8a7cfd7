//! In-memory [`BetStore`].

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::market::{BetStatus, MarketDescriptor, MatchStatus, ScoreSnapshot};

use super::{
    BetRecord, BetStore, BetUpdate, Grade, MatchRecord, NewBet, NewMatch, NewPromotion,
    PromotedBet,
};

#[derive(Debug, Default)]
struct Tables {
    matches: Vec<MatchRecord>,
    bets: Vec<BetRecord>,
    promotions: Vec<PromotedBet>,
}

impl Tables {
    fn match_mut(&mut self, id: u64) -> Result<&mut MatchRecord, StoreError> {
        self.matches
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(StoreError::NotFound { entity: "match", id })
    }

    fn has_ready_bet(&self, match_id: u64) -> bool {
        self.bets
            .iter()
            .any(|b| b.match_id == match_id && b.status == BetStatus::Ready)
    }

    fn has_ungraded_promotion(&self, match_id: u64) -> bool {
        self.promotions
            .iter()
            .any(|p| p.match_id == match_id && p.awaits_grade())
    }
}

/// Store that keeps every table behind one lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every promotion, in insertion order.
    pub async fn all_promotions(&self) -> Vec<PromotedBet> {
        self.tables.lock().await.promotions.clone()
    }

    /// Every bet record, in insertion order.
    pub async fn all_bets(&self) -> Vec<BetRecord> {
        self.tables.lock().await.bets.clone()
    }
}

#[async_trait]
impl BetStore for MemoryStore {
    async fn upsert_match(&self, new: NewMatch) -> Result<MatchRecord, StoreError> {
        let mut t = self.tables.lock().await;
        if let Some(existing) = t.matches.iter_mut().find(|m| m.match_ref == new.match_ref) {
            existing.kickoff = new.kickoff;
            existing.fixture = new.fixture;
            return Ok(existing.clone());
        }
        let record = MatchRecord {
            id: t.matches.len() as u64 + 1,
            match_ref: new.match_ref,
            kickoff: new.kickoff,
            fixture: new.fixture,
            status: MatchStatus::Pending,
            score_fixture_id: None,
            score: ScoreSnapshot::default(),
        };
        t.matches.push(record.clone());
        Ok(record)
    }

    async fn find_match(&self, match_ref: &str) -> Result<Option<MatchRecord>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.matches.iter().find(|m| m.match_ref == match_ref).cloned())
    }

    async fn get_match(&self, id: u64) -> Result<MatchRecord, StoreError> {
        let mut t = self.tables.lock().await;
        t.match_mut(id).map(|m| m.clone())
    }

    async fn find_bet(
        &self,
        match_ref: &str,
        market: &MarketDescriptor,
    ) -> Result<Option<BetRecord>, StoreError> {
        let t = self.tables.lock().await;
        let Some(m) = t.matches.iter().find(|m| m.match_ref == match_ref) else {
            return Ok(None);
        };
        Ok(t
            .bets
            .iter()
            .find(|b| b.match_id == m.id && b.market == *market)
            .cloned())
    }

    async fn insert_bet(&self, new: NewBet) -> Result<BetRecord, StoreError> {
        let mut t = self.tables.lock().await;
        if let Some(existing) = t
            .bets
            .iter()
            .find(|b| b.match_id == new.match_id && b.market == new.market)
        {
            return Ok(existing.clone());
        }
        let record = BetRecord {
            id: t.bets.len() as u64 + 1,
            match_id: new.match_id,
            market: new.market,
            aggregator_odds: new.aggregator_odds,
            reference_odds: new.reference_odds,
            final_reference_odds: None,
            status: new.status,
            updated_at: OffsetDateTime::now_utc(),
        };
        t.bets.push(record.clone());
        Ok(record)
    }

    async fn update_bet(&self, id: u64, update: BetUpdate) -> Result<BetRecord, StoreError> {
        let mut t = self.tables.lock().await;
        let bet = t
            .bets
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(StoreError::NotFound { entity: "bet", id })?;
        if let Some(odds) = update.aggregator_odds {
            bet.aggregator_odds = odds;
        }
        if let Some(odds) = update.reference_odds {
            bet.reference_odds = Some(odds);
        }
        if let Some(odds) = update.final_reference_odds {
            bet.final_reference_odds = Some(odds);
        }
        if let Some(status) = update.status {
            bet.status = bet.status.advance(status);
        }
        bet.updated_at = OffsetDateTime::now_utc();
        Ok(bet.clone())
    }

    async fn bets_for_match(
        &self,
        match_id: u64,
        status: Option<BetStatus>,
    ) -> Result<Vec<BetRecord>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.bets
            .iter()
            .filter(|b| b.match_id == match_id && status.map_or(true, |s| b.status == s))
            .cloned()
            .collect())
    }

    async fn matches_near_kickoff(
        &self,
        after: OffsetDateTime,
        until: OffsetDateTime,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        let t = self.tables.lock().await;
        let mut out: Vec<MatchRecord> = t
            .matches
            .iter()
            .filter(|m| {
                m.status == MatchStatus::Pending
                    && m.kickoff > after
                    && m.kickoff <= until
                    && t.has_ready_bet(m.id)
            })
            .cloned()
            .collect();
        out.sort_by_key(|m| m.kickoff);
        Ok(out)
    }

    async fn mark_match_final(&self, id: u64) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        t.match_mut(id)?.status = MatchStatus::Final;
        Ok(())
    }

    async fn insert_promotion(&self, new: NewPromotion) -> Result<PromotedBet, StoreError> {
        let mut t = self.tables.lock().await;
        let id = t.promotions.len() as u64 + 1;
        let record = PromotedBet {
            id,
            sequence: id,
            bet_id: new.bet_id,
            match_id: new.match_id,
            market: new.market,
            reversed: new.reversed,
            special: new.special,
            secondary: new.secondary,
            valid: true,
            grade: None,
            grade_rejected: false,
        };
        t.promotions.push(record.clone());
        Ok(record)
    }

    async fn set_promotion_valid(&self, id: u64, valid: bool) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        let p = t
            .promotions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound {
                entity: "promotion",
                id,
            })?;
        p.valid = valid;
        Ok(())
    }

    async fn promotions_for_match(&self, match_id: u64) -> Result<Vec<PromotedBet>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.promotions
            .iter()
            .filter(|p| p.match_id == match_id)
            .cloned()
            .collect())
    }

    async fn matches_awaiting_grade(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        let t = self.tables.lock().await;
        let mut out: Vec<MatchRecord> = t
            .matches
            .iter()
            .filter(|m| {
                m.status == MatchStatus::Final
                    && m.kickoff >= from
                    && m.kickoff <= to
                    && t.has_ungraded_promotion(m.id)
            })
            .cloned()
            .collect();
        out.sort_by_key(|m| m.kickoff);
        Ok(out)
    }

    async fn set_score_fixture(&self, match_id: u64, fixture_id: &str) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        t.match_mut(match_id)?.score_fixture_id = Some(fixture_id.to_string());
        Ok(())
    }

    async fn record_score(&self, match_id: u64, score: &ScoreSnapshot) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        t.match_mut(match_id)?.score.merge(score);
        Ok(())
    }

    async fn record_grade(&self, promotion_id: u64, grade: Grade) -> Result<bool, StoreError> {
        let mut t = self.tables.lock().await;
        let p = t
            .promotions
            .iter_mut()
            .find(|p| p.id == promotion_id)
            .ok_or(StoreError::NotFound {
                entity: "promotion",
                id: promotion_id,
            })?;
        if p.grade.is_some() {
            return Ok(false);
        }
        p.grade = Some(grade);
        Ok(true)
    }

    async fn mark_grade_rejected(&self, promotion_id: u64) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        let p = t
            .promotions
            .iter_mut()
            .find(|p| p.id == promotion_id)
            .ok_or(StoreError::NotFound {
                entity: "promotion",
                id: promotion_id,
            })?;
        p.grade_rejected = true;
        Ok(())
    }
}
