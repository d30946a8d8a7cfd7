//! JSON batches handed from the feed loop to the ready stage.
//!
//! Delivery is at-least-once; the ready stage tolerates duplicates.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{HandicapError, Result};
use crate::market::Opportunity;

/// Opportunities of one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityBatch {
    /// Reference-site match id.
    pub match_ref: String,
    /// Kickoff of the match.
    #[serde(with = "time::serde::timestamp::milliseconds")]
    pub kickoff: OffsetDateTime,
    /// Kickoff is close enough to run the final stage right after the ready stage.
    #[serde(default)]
    pub direct_final: bool,
    /// Opportunities in feed order.
    pub opportunities: Vec<Opportunity>,
}

impl OpportunityBatch {
    /// Encode for the wire.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from the wire.
    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Group opportunities by match, in order of first appearance.
pub fn group_batches(
    opportunities: Vec<Opportunity>,
    now: OffsetDateTime,
    direct_final_window: Duration,
) -> Vec<OpportunityBatch> {
    let window = time::Duration::try_from(direct_final_window).unwrap_or(time::Duration::ZERO);
    let mut batches: Vec<OpportunityBatch> = Vec::new();
    for opp in opportunities {
        match batches.iter_mut().find(|b| b.match_ref == opp.match_ref) {
            Some(batch) => batch.opportunities.push(opp),
            None => batches.push(OpportunityBatch {
                match_ref: opp.match_ref.clone(),
                kickoff: opp.kickoff,
                direct_final: opp.kickoff - now <= window,
                opportunities: vec![opp],
            }),
        }
    }
    batches
}

/// Sending half of the handoff channel.
#[derive(Debug, Clone)]
pub struct BatchSender {
    tx: mpsc::Sender<String>,
}

impl BatchSender {
    /// Encode and send a batch.
    pub async fn send(&self, batch: &OpportunityBatch) -> Result<()> {
        self.tx
            .send(batch.encode()?)
            .await
            .map_err(|_| HandicapError::ChannelClosed)
    }
}

/// Receiving half of the handoff channel.
#[derive(Debug)]
pub struct BatchReceiver {
    rx: mpsc::Receiver<String>,
}

impl BatchReceiver {
    /// Next decodable batch. Undecodable messages are logged and dropped.
    pub async fn recv(&mut self) -> Option<OpportunityBatch> {
        while let Some(raw) = self.rx.recv().await {
            match OpportunityBatch::decode(&raw) {
                Ok(batch) => return Some(batch),
                Err(e) => warn!(error = %e, "Dropping undecodable batch"),
            }
        }
        None
    }
}

/// Bounded handoff channel.
pub fn channel(capacity: usize) -> (BatchSender, BatchReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (BatchSender { tx }, BatchReceiver { rx })
}
