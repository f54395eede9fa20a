//! Platform-level auction statistics.

use std::collections::VecDeque;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;

use adx_core::models::PRICE_SCALE;
use adx_core::AuctionResult;

/// Bid prices retained for the recent-bid metrics.
const RECENT_PRICE_CAP: usize = 100;

/// Aggregates over recently observed bid prices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidMetrics {
    pub total_bids: u64,
    pub highest_bid: Decimal,
    pub lowest_bid: Decimal,
    pub average_bid: Decimal,
    pub bid_range: Decimal,
}

impl BidMetrics {
    fn empty() -> Self {
        Self {
            total_bids: 0,
            highest_bid: Decimal::ZERO,
            lowest_bid: Decimal::ZERO,
            average_bid: Decimal::ZERO,
            bid_range: Decimal::ZERO,
        }
    }
}

/// Point-in-time platform stats, served by the exchange stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformSnapshot {
    pub total_auctions: u64,
    pub successful_auctions: u64,
    pub success_rate: f64,
    pub total_revenue: Decimal,
    pub win_notice_failures: u64,
    pub recent_bids: BidMetrics,
}

#[derive(Debug, Default)]
struct Inner {
    total_auctions: u64,
    successful_auctions: u64,
    total_revenue: Decimal,
    win_notice_failures: u64,
    recent_prices: VecDeque<Decimal>,
}

/// Exchange-wide counters, updated once per auction under a single lock.
#[derive(Debug, Default)]
pub struct PlatformStats {
    inner: Mutex<Inner>,
}

impl PlatformStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed auction. Platform revenue accrues the fee share of
    /// the clearing price on auctions with a winner.
    pub fn record_auction(&self, result: &AuctionResult, fee_rate: Decimal) {
        let mut inner = self.inner.lock();
        inner.total_auctions += 1;
        for bid in &result.all_bids {
            inner.recent_prices.push_back(bid.price);
            while inner.recent_prices.len() > RECENT_PRICE_CAP {
                inner.recent_prices.pop_front();
            }
        }
        if result.has_winner() {
            inner.successful_auctions += 1;
            inner.total_revenue += (result.clearing_price * fee_rate).round_dp(PRICE_SCALE);
        }
    }

    pub fn record_win_notice_failure(&self) {
        self.inner.lock().win_notice_failures += 1;
    }

    #[must_use]
    pub fn snapshot(&self) -> PlatformSnapshot {
        let inner = self.inner.lock();
        let recent_bids = if inner.recent_prices.is_empty() {
            BidMetrics::empty()
        } else {
            let highest = inner.recent_prices.iter().copied().max().unwrap_or_default();
            let lowest = inner.recent_prices.iter().copied().min().unwrap_or_default();
            let sum: Decimal = inner.recent_prices.iter().copied().sum();
            let count = Decimal::from(inner.recent_prices.len() as u64);
            BidMetrics {
                total_bids: inner.recent_prices.len() as u64,
                highest_bid: highest,
                lowest_bid: lowest,
                average_bid: (sum / count).round_dp(PRICE_SCALE),
                bid_range: highest - lowest,
            }
        };
        PlatformSnapshot {
            total_auctions: inner.total_auctions,
            successful_auctions: inner.successful_auctions,
            success_rate: if inner.total_auctions == 0 {
                0.0
            } else {
                inner.successful_auctions as f64 / inner.total_auctions as f64
            },
            total_revenue: inner.total_revenue,
            win_notice_failures: inner.win_notice_failures,
            recent_bids,
        }
    }
}
