//! Auction coordinator.
//!
//! Fans a validated bid request out to every registered bid source, each
//! under the per-bidder deadline, with a global auction deadline that aborts
//! stragglers. Ranking and clearing are pure over the collected bids.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tokio::task::JoinSet;
use uuid::Uuid;

use adx_core::{AuctionConfig, AuctionResult, Bid, BidRequest, ValidationError, WinNotice};

use crate::gateway::BidSource;
use crate::stats::PlatformStats;

/// Ranks bids and determines the clearing price.
///
/// Bids under the floor are discarded. The highest remaining bid wins; ties
/// keep collection order, so the earlier bid prevails. Under second-price
/// clearing with two or more valid bids the winner pays
/// `min(top, second + increment)`, otherwise the winning price.
#[must_use]
pub fn evaluate_bids(
    bids: &[Bid],
    floor: Decimal,
    config: &AuctionConfig,
) -> (Option<Bid>, Decimal) {
    let mut valid: Vec<&Bid> = bids.iter().filter(|b| b.price >= floor).collect();
    if valid.is_empty() {
        return (None, Decimal::ZERO);
    }
    valid.sort_by(|a, b| b.price.cmp(&a.price));

    let winner = valid[0];
    let clearing = if config.second_price && valid.len() >= 2 {
        (valid[1].price + config.price_increment).min(winner.price)
    } else {
        winner.price
    };
    (Some(winner.clone()), clearing)
}

/// Coordinates auctions across registered bid sources.
pub struct AuctionEngine {
    exchange_id: String,
    config: AuctionConfig,
    sources: RwLock<Vec<Arc<dyn BidSource>>>,
    history: RwLock<HashMap<String, AuctionResult>>,
    stats: Arc<PlatformStats>,
}

impl AuctionEngine {
    #[must_use]
    pub fn new(exchange_id: impl Into<String>, config: AuctionConfig) -> Self {
        Self {
            exchange_id: exchange_id.into(),
            config,
            sources: RwLock::new(Vec::new()),
            history: RwLock::new(HashMap::new()),
            stats: Arc::new(PlatformStats::new()),
        }
    }

    #[must_use]
    pub fn exchange_id(&self) -> &str {
        &self.exchange_id
    }

    #[must_use]
    pub fn config(&self) -> &AuctionConfig {
        &self.config
    }

    pub fn register_source(&self, source: Arc<dyn BidSource>) {
        tracing::info!(bidder = %source.bidder_id(), "bid source registered");
        self.sources.write().push(source);
    }

    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.read().len()
    }

    /// Looks up a registered source by bidder id.
    #[must_use]
    pub fn source(&self, bidder_id: &str) -> Option<Arc<dyn BidSource>> {
        self.sources
            .read()
            .iter()
            .find(|s| s.bidder_id() == bidder_id)
            .cloned()
    }

    /// A previously recorded auction result.
    #[must_use]
    pub fn auction(&self, auction_id: &str) -> Option<AuctionResult> {
        self.history.read().get(auction_id).cloned()
    }

    #[must_use]
    pub fn stats(&self) -> &PlatformStats {
        &self.stats
    }

    /// Runs one auction end to end.
    ///
    /// # Errors
    /// Returns a `ValidationError` for malformed requests; everything past
    /// validation degrades instead of failing.
    pub async fn run_auction(&self, request: BidRequest) -> Result<AuctionResult, ValidationError> {
        request.validate()?;

        let bids = self.collect_bids(&request).await;
        let (winning_bid, clearing_price) =
            evaluate_bids(&bids, request.ad_slot.floor_price, &self.config);

        let result = AuctionResult {
            auction_id: Uuid::new_v4().to_string(),
            request_id: request.id.clone(),
            winning_bid,
            all_bids: bids,
            clearing_price,
            timestamp: Utc::now(),
        };

        self.stats.record_auction(&result, self.config.platform_fee_rate);
        self.history
            .write()
            .insert(result.auction_id.clone(), result.clone());

        match &result.winning_bid {
            Some(winner) => {
                tracing::info!(
                    auction = %result.auction_id,
                    bidder = %winner.bidder_id,
                    campaign = %winner.campaign_id,
                    bid = %winner.price,
                    clearing = %clearing_price,
                    "auction won"
                );
                self.notify_winner(winner, &request, clearing_price);
            }
            None => {
                tracing::info!(
                    auction = %result.auction_id,
                    bids = result.all_bids.len(),
                    "auction ended without a winner"
                );
            }
        }

        Ok(result)
    }

    /// Solicits all sources concurrently under the per-bidder and global
    /// deadlines. Bids arrive in completion order.
    async fn collect_bids(&self, request: &BidRequest) -> Vec<Bid> {
        let sources: Vec<_> = self.sources.read().iter().cloned().collect();
        let per_bidder = self.config.bidder_timeout();

        let mut set = JoinSet::new();
        for source in sources {
            let request = request.clone();
            set.spawn(async move {
                match tokio::time::timeout(per_bidder, source.request_bid(&request)).await {
                    Ok(bid) => bid,
                    Err(_) => {
                        tracing::debug!(
                            bidder = %source.bidder_id(),
                            request = %request.id,
                            "bidder missed its deadline"
                        );
                        None
                    }
                }
            });
        }

        let deadline = tokio::time::sleep(self.config.auction_timeout());
        tokio::pin!(deadline);

        let mut bids = Vec::new();
        loop {
            tokio::select! {
                joined = set.join_next() => match joined {
                    Some(Ok(Some(bid))) => bids.push(bid),
                    Some(Ok(None)) => {}
                    Some(Err(e)) => tracing::warn!(error = %e, "bid task failed"),
                    None => break,
                },
                () = &mut deadline => {
                    tracing::warn!(request = %request.id, "auction deadline reached, aborting stragglers");
                    set.abort_all();
                    break;
                }
            }
        }
        bids
    }

    /// Fires the win notice on a detached task; delivery failures are counted
    /// but never fail the auction.
    fn notify_winner(&self, winner: &Bid, request: &BidRequest, clearing_price: Decimal) {
        let Some(source) = self.source(&winner.bidder_id) else {
            tracing::warn!(bidder = %winner.bidder_id, "winning source no longer registered");
            return;
        };
        let notice = WinNotice {
            request_id: request.id.clone(),
            campaign_id: winner.campaign_id.clone(),
            user_id: request.user_id.clone(),
            price: clearing_price,
        };
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            if let Err(e) = source.send_win_notice(&notice).await {
                stats.record_win_notice_failure();
                tracing::warn!(
                    bidder = %source.bidder_id(),
                    request = %notice.request_id,
                    error = %e,
                    "win notice delivery failed"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adx_core::{AdSlot, AuctionFeedback, Creative, Device, DeviceType, Geo};
    use adx_rpc::RpcError;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    struct ScriptedSource {
        id: String,
        price: Option<Decimal>,
        delay: Duration,
        notices: AtomicU64,
        fail_notices: bool,
    }

    impl ScriptedSource {
        fn bidding(id: &str, price: Decimal) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                price: Some(price),
                delay: Duration::ZERO,
                notices: AtomicU64::new(0),
                fail_notices: false,
            })
        }

        fn slow(id: &str, price: Decimal, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                price: Some(price),
                delay,
                notices: AtomicU64::new(0),
                fail_notices: false,
            })
        }

        fn passing(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                price: None,
                delay: Duration::ZERO,
                notices: AtomicU64::new(0),
                fail_notices: false,
            })
        }
    }

    #[async_trait]
    impl BidSource for ScriptedSource {
        fn bidder_id(&self) -> &str {
            &self.id
        }

        async fn request_bid(&self, request: &BidRequest) -> Option<Bid> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.price.map(|price| Bid {
                request_id: request.id.clone(),
                price,
                creative: Creative {
                    title: format!("creative {}", self.id),
                    description: None,
                    image_url: None,
                },
                campaign_id: format!("camp-{}", self.id),
                bidder_id: self.id.clone(),
            })
        }

        async fn send_win_notice(&self, _notice: &WinNotice) -> Result<(), RpcError> {
            if self.fail_notices {
                return Err(RpcError::unavailable(&self.id, "down"));
            }
            self.notices.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send_feedback(&self, _feedback: &AuctionFeedback) -> Result<(), RpcError> {
            Ok(())
        }
    }

    fn request(floor: Decimal) -> BidRequest {
        BidRequest {
            id: "req-1".to_string(),
            user_id: "user-1".to_string(),
            ad_slot: AdSlot {
                id: "slot-1".to_string(),
                width: 300,
                height: 250,
                position: "top".to_string(),
                floor_price: floor,
            },
            device: Device {
                device_type: DeviceType::Mobile,
                os: "iOS".to_string(),
                browser: "Safari".to_string(),
                ip: "203.0.113.7".to_string(),
            },
            geo: Geo {
                country: "US".to_string(),
                region: "CA".to_string(),
                city: "San Francisco".to_string(),
            },
            timestamp: Utc::now(),
        }
    }

    fn bid(price: Decimal) -> Bid {
        Bid {
            request_id: "req-1".to_string(),
            price,
            creative: Creative {
                title: "Sale".to_string(),
                description: None,
                image_url: None,
            },
            campaign_id: "camp-1".to_string(),
            bidder_id: "dsp-001".to_string(),
        }
    }

    // ============================================
    // evaluate_bids
    // ============================================

    #[test]
    fn second_price_clears_at_second_plus_increment() {
        let config = AuctionConfig::default();
        let bids = vec![bid(dec!(0.80)), bid(dec!(0.60)), bid(dec!(0.40))];
        let (winner, clearing) = evaluate_bids(&bids, dec!(0.10), &config);
        assert_eq!(winner.unwrap().price, dec!(0.80));
        assert_eq!(clearing, dec!(0.61));
    }

    #[test]
    fn clearing_never_exceeds_winning_bid() {
        let config = AuctionConfig::default();
        let bids = vec![bid(dec!(0.50)), bid(dec!(0.50))];
        let (winner, clearing) = evaluate_bids(&bids, dec!(0.10), &config);
        assert!(winner.is_some());
        assert_eq!(clearing, dec!(0.50));
    }

    #[test]
    fn single_bid_pays_its_own_price() {
        let config = AuctionConfig::default();
        let bids = vec![bid(dec!(0.80))];
        let (winner, clearing) = evaluate_bids(&bids, dec!(0.10), &config);
        assert_eq!(winner.unwrap().price, dec!(0.80));
        assert_eq!(clearing, dec!(0.80));
    }

    #[test]
    fn bids_below_floor_are_discarded() {
        let config = AuctionConfig::default();
        let bids = vec![bid(dec!(0.05))];
        let (winner, clearing) = evaluate_bids(&bids, dec!(0.10), &config);
        assert!(winner.is_none());
        assert_eq!(clearing, Decimal::ZERO);
    }

    #[test]
    fn floor_filter_applies_before_second_price() {
        // Only one bid survives the floor, so it pays its own price.
        let config = AuctionConfig::default();
        let bids = vec![bid(dec!(0.80)), bid(dec!(0.05))];
        let (winner, clearing) = evaluate_bids(&bids, dec!(0.10), &config);
        assert_eq!(winner.unwrap().price, dec!(0.80));
        assert_eq!(clearing, dec!(0.80));
    }

    #[test]
    fn ties_keep_arrival_order() {
        let config = AuctionConfig::default();
        let mut first = bid(dec!(0.70));
        first.bidder_id = "early".to_string();
        let mut second = bid(dec!(0.70));
        second.bidder_id = "late".to_string();
        let (winner, _) = evaluate_bids(&[first, second], dec!(0.10), &config);
        assert_eq!(winner.unwrap().bidder_id, "early");
    }

    #[test]
    fn first_price_mode_clears_at_top() {
        let config = AuctionConfig::default().with_second_price(false);
        let bids = vec![bid(dec!(0.80)), bid(dec!(0.60))];
        let (_, clearing) = evaluate_bids(&bids, dec!(0.10), &config);
        assert_eq!(clearing, dec!(0.80));
    }

    // ============================================
    // run_auction
    // ============================================

    #[tokio::test]
    async fn auction_selects_highest_bidder_and_notifies() {
        let engine = AuctionEngine::new("adx-001", AuctionConfig::default());
        let high = ScriptedSource::bidding("high", dec!(0.80));
        engine.register_source(ScriptedSource::bidding("low", dec!(0.60)));
        engine.register_source(Arc::clone(&high) as Arc<dyn BidSource>);
        engine.register_source(ScriptedSource::passing("quiet"));

        let result = engine.run_auction(request(dec!(0.50))).await.unwrap();

        assert_eq!(result.all_bids.len(), 2);
        let winner = result.winning_bid.unwrap();
        assert_eq!(winner.bidder_id, "high");
        assert_eq!(result.clearing_price, dec!(0.61));

        // Detached notice task gets a chance to run.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(high.notices.load(Ordering::SeqCst), 1);
        assert_eq!(engine.auction(&result.auction_id).unwrap().request_id, "req-1");
    }

    #[tokio::test]
    async fn below_floor_bids_leave_no_winner() {
        let engine = AuctionEngine::new("adx-001", AuctionConfig::default());
        engine.register_source(ScriptedSource::bidding("low", dec!(0.30)));

        let result = engine.run_auction(request(dec!(0.50))).await.unwrap();
        assert!(result.winning_bid.is_none());
        assert_eq!(result.clearing_price, Decimal::ZERO);
        assert_eq!(engine.stats().snapshot().successful_auctions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_bidder_is_excluded_by_its_deadline() {
        let engine = AuctionEngine::new("adx-001", AuctionConfig::default());
        engine.register_source(ScriptedSource::bidding("fast", dec!(0.60)));
        engine.register_source(ScriptedSource::slow(
            "slow",
            dec!(0.90),
            Duration::from_millis(80),
        ));

        let result = engine.run_auction(request(dec!(0.10))).await.unwrap();

        assert_eq!(result.all_bids.len(), 1);
        assert_eq!(result.winning_bid.unwrap().bidder_id, "fast");
    }

    #[tokio::test(start_paused = true)]
    async fn global_deadline_aborts_everything_outstanding() {
        // Per-bidder deadline longer than the auction deadline.
        let config = AuctionConfig::default().with_timeouts(50, 200);
        let engine = AuctionEngine::new("adx-001", config);
        engine.register_source(ScriptedSource::slow(
            "slow",
            dec!(0.90),
            Duration::from_millis(150),
        ));

        let result = engine.run_auction(request(dec!(0.10))).await.unwrap();
        assert!(result.all_bids.is_empty());
        assert!(result.winning_bid.is_none());
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_fanout() {
        let engine = AuctionEngine::new("adx-001", AuctionConfig::default());
        let mut req = request(dec!(0.10));
        req.id = String::new();
        assert!(engine.run_auction(req).await.is_err());
        assert_eq!(engine.stats().snapshot().total_auctions, 0);
    }

    #[tokio::test]
    async fn failed_win_notice_is_counted_not_fatal() {
        let engine = AuctionEngine::new("adx-001", AuctionConfig::default());
        let flaky = Arc::new(ScriptedSource {
            id: "flaky".to_string(),
            price: Some(dec!(0.80)),
            delay: Duration::ZERO,
            notices: AtomicU64::new(0),
            fail_notices: true,
        });
        engine.register_source(flaky);

        let result = engine.run_auction(request(dec!(0.10))).await.unwrap();
        assert!(result.winning_bid.is_some());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(engine.stats().snapshot().win_notice_failures, 1);
    }
}
