//! Bidding decision engine.
//!
//! For each bid request: validate, find serving campaigns whose targeting
//! accepts the request and whose user is under the daily frequency cap, pick
//! the one with the most remaining budget, and price the bid.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;

use adx_core::{Bid, BidRequest, BiddingConfig, Campaign, CampaignStats, UserProfile, ValidationError, WinNotice};

use crate::error::BidderError;
use crate::pricing;
use crate::store::CampaignStore;
use crate::targeting;

/// Submitted bids retained in the recent-bid log.
const BID_HISTORY_CAP: usize = 100;

/// One submitted bid, as served by the bid-history endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct BidRecord {
    pub request_id: String,
    pub campaign_id: String,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Point-in-time view of engine activity, served by the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub bidder_id: String,
    pub total_bid_requests: u64,
    pub total_bids_submitted: u64,
    pub bid_rate: f64,
    pub active_campaigns: usize,
    pub total_spend: Decimal,
    pub campaigns: Vec<CampaignStats>,
}

/// Decides whether and how much to bid on incoming requests.
pub struct BiddingEngine {
    config: BiddingConfig,
    store: Arc<CampaignStore>,
    bid_requests: AtomicU64,
    bids_submitted: AtomicU64,
    history: Mutex<VecDeque<BidRecord>>,
}

impl BiddingEngine {
    #[must_use]
    pub fn new(config: BiddingConfig, store: Arc<CampaignStore>) -> Self {
        Self {
            config,
            store,
            bid_requests: AtomicU64::new(0),
            bids_submitted: AtomicU64::new(0),
            history: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub fn bidder_id(&self) -> &str {
        &self.config.bidder_id
    }

    #[must_use]
    pub fn store(&self) -> &CampaignStore {
        &self.store
    }

    /// Evaluates a bid request.
    ///
    /// Returns `Ok(None)` when no campaign qualifies; a missing bid is a
    /// normal outcome, not an error.
    ///
    /// # Errors
    /// Returns a `ValidationError` for malformed requests.
    pub fn evaluate(
        &self,
        request: &BidRequest,
        profile: Option<&UserProfile>,
    ) -> Result<Option<Bid>, ValidationError> {
        request.validate()?;
        self.bid_requests.fetch_add(1, Ordering::Relaxed);

        let today = Utc::now().date_naive();
        let candidates: Vec<Campaign> = self
            .store
            .serving()
            .into_iter()
            .filter(|c| targeting::matches(&c.targeting, request, profile))
            .filter(|c| {
                self.store.frequency_count(&request.user_id, &c.id, today)
                    < self.config.daily_frequency_cap
            })
            .collect();

        // Largest remaining budget wins; ties keep the first candidate.
        let Some(campaign) = candidates.into_iter().reduce(|best, c| {
            if c.remaining_budget() > best.remaining_budget() {
                c
            } else {
                best
            }
        }) else {
            tracing::debug!(request = %request.id, "no qualifying campaign, passing");
            return Ok(None);
        };

        let price = pricing::compute(&self.config, request, profile);
        let bid = Bid {
            request_id: request.id.clone(),
            price,
            creative: campaign.creative.clone(),
            campaign_id: campaign.id.clone(),
            bidder_id: self.config.bidder_id.clone(),
        };
        self.bids_submitted.fetch_add(1, Ordering::Relaxed);
        self.record_bid(&bid);
        tracing::debug!(
            request = %request.id,
            campaign = %campaign.id,
            price = %price,
            "bid submitted"
        );
        Ok(Some(bid))
    }

    fn record_bid(&self, bid: &Bid) {
        let mut history = self.history.lock();
        history.push_back(BidRecord {
            request_id: bid.request_id.clone(),
            campaign_id: bid.campaign_id.clone(),
            price: bid.price,
            timestamp: Utc::now(),
        });
        while history.len() > BID_HISTORY_CAP {
            history.pop_front();
        }
    }

    /// Recently submitted bids, oldest first.
    #[must_use]
    pub fn bid_history(&self) -> Vec<BidRecord> {
        self.history.lock().iter().cloned().collect()
    }

    /// Applies a win notice for today.
    ///
    /// # Errors
    /// Returns the store's rejection (unknown campaign or budget exceeded).
    pub fn record_win(&self, notice: &WinNotice) -> Result<(), BidderError> {
        self.store.record_win(notice, Utc::now().date_naive())
    }

    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        let requests = self.bid_requests.load(Ordering::Relaxed);
        let bids = self.bids_submitted.load(Ordering::Relaxed);
        EngineSnapshot {
            bidder_id: self.config.bidder_id.clone(),
            total_bid_requests: requests,
            total_bids_submitted: bids,
            bid_rate: if requests == 0 {
                0.0
            } else {
                bids as f64 / requests as f64
            },
            active_campaigns: self.store.serving().len(),
            total_spend: self.store.total_spend(),
            campaigns: self.store.all_stats(),
        }
    }
}
