//! End-to-end RTB workflow orchestration.
//!
//! One run walks a simulated user visit through profile resolution, request
//! assembly, the auction, display resolution, and the feedback fan-out. Every
//! step produces a typed result; optional peer services degrade gracefully
//! instead of failing the run.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use adx_core::models::PRICE_SCALE;
use adx_core::{
    AdSlot, AuctionFeedback, AuctionResult, BidRequest, Device, DeviceType, Geo, UserProfile,
};
use adx_rpc::PeerClient;

use crate::auction::AuctionEngine;

// ============================================
// Step results
// ============================================

/// Optional overrides for a workflow run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserContext {
    pub user_id: Option<String>,
    pub device_type: Option<DeviceType>,
    pub country: Option<String>,
    pub page_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

/// Outcome of one best-effort side update.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepOutcome {
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: StepStatus::Success,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Failed,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn skipped() -> Self {
        Self {
            status: StepStatus::Skipped,
            error: None,
        }
    }
}

/// A simulated page visit.
#[derive(Debug, Clone, Serialize)]
pub struct VisitData {
    pub user_id: String,
    pub session_id: String,
    pub page_url: String,
    pub referrer: String,
    pub device: Device,
    pub geo: Geo,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayType {
    PaidAd,
    Fallback,
}

/// How the clearing price is divided.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueSplit {
    pub advertiser_payment: Decimal,
    pub platform_fee: Decimal,
    pub publisher_revenue: Decimal,
}

/// What ends up on the page.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayOutcome {
    pub display_type: DisplayType,
    pub impression_confirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impression_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_split: Option<RevenueSplit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DisplayOutcome {
    fn fallback(reason: impl Into<String>) -> Self {
        Self {
            display_type: DisplayType::Fallback,
            impression_confirmed: false,
            impression_id: None,
            campaign_id: None,
            price: Decimal::ZERO,
            revenue_split: None,
            fallback_reason: Some(reason.into()),
            error: None,
        }
    }
}

/// Independent outcomes of the post-auction feedback fan-out.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackReport {
    pub profile_update: StepOutcome,
    pub bidder_update: StepOutcome,
    pub supply_update: StepOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Success,
    Failed,
}

/// All step results of one run, in execution order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowSteps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit: Option<VisitData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid_request: Option<BidRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auction: Option<AuctionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackReport>,
}

/// One completed workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRun {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: f64,
    pub steps: WorkflowSteps,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================
// Workflow statistics
// ============================================

#[derive(Debug, Default)]
struct StatsInner {
    total_runs: u64,
    successful_runs: u64,
    failed_runs: u64,
    average_duration_ms: f64,
}

/// Aggregate view over all runs.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStatsSnapshot {
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub success_rate: f64,
    pub average_duration_ms: f64,
}

// ============================================
// Side-update payloads
// ============================================

/// Behavioral event pushed to the profile service.
#[derive(Debug, Serialize)]
struct ProfileEvent<'a> {
    user_id: &'a str,
    event_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    campaign_id: Option<&'a str>,
    price: Decimal,
    timestamp: DateTime<Utc>,
}

/// Impression registration sent to the supply service.
#[derive(Debug, Serialize)]
struct ImpressionEvent<'a> {
    impression_id: &'a str,
    request_id: &'a str,
    campaign_id: &'a str,
    user_id: &'a str,
    price: Decimal,
}

/// Revenue report sent to the supply service after display.
#[derive(Debug, Serialize)]
struct DeliveryReport<'a> {
    request_id: &'a str,
    price: Decimal,
    publisher_revenue: Decimal,
}

// ============================================
// Orchestrator
// ============================================

/// Drives complete RTB workflow runs over an [`AuctionEngine`] and optional
/// profile and supply services.
pub struct WorkflowOrchestrator {
    engine: Arc<AuctionEngine>,
    profile_client: Option<PeerClient>,
    supply_client: Option<PeerClient>,
    stats: Mutex<StatsInner>,
}

impl WorkflowOrchestrator {
    #[must_use]
    pub fn new(engine: Arc<AuctionEngine>) -> Self {
        Self {
            engine,
            profile_client: None,
            supply_client: None,
            stats: Mutex::new(StatsInner::default()),
        }
    }

    #[must_use]
    pub fn with_profile_service(mut self, client: PeerClient) -> Self {
        self.profile_client = Some(client);
        self
    }

    #[must_use]
    pub fn with_supply_service(mut self, client: PeerClient) -> Self {
        self.supply_client = Some(client);
        self
    }

    /// Executes one complete workflow run.
    pub async fn execute(&self, ctx: Option<UserContext>) -> WorkflowRun {
        let clock = Instant::now();
        let started_at = Utc::now();
        let workflow_id = Uuid::new_v4().to_string();
        let mut steps = WorkflowSteps::default();
        let mut error = None;

        let visit = simulate_visit(ctx.unwrap_or_default());
        tracing::info!(workflow = %workflow_id, user = %visit.user_id, "workflow started");
        steps.visit = Some(visit.clone());

        let profile = self.resolve_profile(&visit.user_id).await;
        steps.profile = Some(profile.clone());

        let request = self.assemble_request(&visit);
        steps.bid_request = Some(request.clone());

        let status = match self.engine.run_auction(request).await {
            Ok(auction) => {
                steps.auction = Some(auction.clone());
                let display = self.resolve_display(&auction, &visit).await;
                steps.display = Some(display);
                steps.feedback = Some(self.dispatch_feedback(&visit, &auction).await);
                WorkflowStatus::Success
            }
            Err(e) => {
                // The run still terminates with a displayable outcome.
                error = Some(e.to_string());
                steps.display = Some(DisplayOutcome::fallback("auction_failed"));
                WorkflowStatus::Failed
            }
        };

        let duration_ms = clock.elapsed().as_secs_f64() * 1000.0;
        self.record_run(status, duration_ms);
        tracing::info!(
            workflow = %workflow_id,
            status = ?status,
            duration_ms,
            "workflow finished"
        );

        WorkflowRun {
            workflow_id,
            status,
            started_at,
            duration_ms,
            steps,
            error,
        }
    }

    #[must_use]
    pub fn stats_snapshot(&self) -> WorkflowStatsSnapshot {
        let stats = self.stats.lock();
        WorkflowStatsSnapshot {
            total_runs: stats.total_runs,
            successful_runs: stats.successful_runs,
            failed_runs: stats.failed_runs,
            success_rate: if stats.total_runs == 0 {
                0.0
            } else {
                stats.successful_runs as f64 / stats.total_runs as f64
            },
            average_duration_ms: stats.average_duration_ms,
        }
    }

    fn record_run(&self, status: WorkflowStatus, duration_ms: f64) {
        let mut stats = self.stats.lock();
        stats.total_runs += 1;
        match status {
            WorkflowStatus::Success => stats.successful_runs += 1,
            WorkflowStatus::Failed => stats.failed_runs += 1,
        }
        let n = stats.total_runs as f64;
        stats.average_duration_ms += (duration_ms - stats.average_duration_ms) / n;
    }

    /// Fetches the user's profile, falling back to the default profile when
    /// the profile service is absent or failing. The default is pushed back
    /// best-effort so later visits find it.
    async fn resolve_profile(&self, user_id: &str) -> UserProfile {
        let Some(client) = &self.profile_client else {
            return UserProfile::default_for(user_id);
        };
        let path = format!("/user/{user_id}/profile");
        match client.get_json::<UserProfile>(&path).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(user = %user_id, error = %e, "profile lookup failed, using default");
                let default = UserProfile::default_for(user_id);
                if let Err(e) = client
                    .put_json::<_, serde_json::Value>(&path, &default)
                    .await
                {
                    tracing::debug!(user = %user_id, error = %e, "default profile writeback failed");
                }
                default
            }
        }
    }

    fn assemble_request(&self, visit: &VisitData) -> BidRequest {
        let mut rng = rand::thread_rng();
        let sizes: &[(u32, u32)] = match visit.device.device_type {
            DeviceType::Mobile => &[(320, 50), (300, 250)],
            DeviceType::Desktop | DeviceType::Tablet => &[(728, 90), (300, 250), (970, 250)],
        };
        let &(width, height) = sizes.choose(&mut rng).unwrap_or(&(300, 250));
        let positions = ["top", "sidebar", "inline"];
        let position = positions.choose(&mut rng).unwrap_or(&"top");

        BidRequest {
            id: Uuid::new_v4().to_string(),
            user_id: visit.user_id.clone(),
            ad_slot: AdSlot {
                id: Uuid::new_v4().to_string(),
                width,
                height,
                position: (*position).to_string(),
                floor_price: self.engine.config().default_floor_price,
            },
            device: visit.device.clone(),
            geo: visit.geo.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Turns the auction outcome into a display decision, registering the
    /// impression with the supply service when there is one.
    async fn resolve_display(&self, auction: &AuctionResult, visit: &VisitData) -> DisplayOutcome {
        let Some(winner) = &auction.winning_bid else {
            return DisplayOutcome::fallback("no_winning_bid");
        };

        let price = auction.clearing_price;
        let fee_rate = self.engine.config().platform_fee_rate;
        let platform_fee = (price * fee_rate).round_dp(PRICE_SCALE);
        let impression_id = Uuid::new_v4().to_string();
        let mut outcome = DisplayOutcome {
            display_type: DisplayType::PaidAd,
            impression_confirmed: true,
            impression_id: Some(impression_id.clone()),
            campaign_id: Some(winner.campaign_id.clone()),
            price,
            revenue_split: Some(RevenueSplit {
                advertiser_payment: price,
                platform_fee,
                publisher_revenue: price - platform_fee,
            }),
            fallback_reason: None,
            error: None,
        };

        if let Some(client) = &self.supply_client {
            let event = ImpressionEvent {
                impression_id: &impression_id,
                request_id: &auction.request_id,
                campaign_id: &winner.campaign_id,
                user_id: &visit.user_id,
                price,
            };
            if let Err(e) = client
                .post_json::<_, serde_json::Value>("/impression", &event)
                .await
            {
                tracing::warn!(error = %e, "impression registration failed");
                outcome.impression_confirmed = false;
                outcome.error = Some(e.to_string());
            }
        }
        outcome
    }

    /// Best-effort side updates after the auction. Each target succeeds or
    /// fails on its own.
    async fn dispatch_feedback(&self, visit: &VisitData, auction: &AuctionResult) -> FeedbackReport {
        let winner = auction.winning_bid.as_ref();

        let profile_update = match &self.profile_client {
            Some(client) => {
                let event = ProfileEvent {
                    user_id: &visit.user_id,
                    event_type: if winner.is_some() {
                        "ad_impression"
                    } else {
                        "ad_request"
                    },
                    campaign_id: winner.map(|w| w.campaign_id.as_str()),
                    price: auction.clearing_price,
                    timestamp: Utc::now(),
                };
                match client
                    .post_json::<_, serde_json::Value>("/events", &event)
                    .await
                {
                    Ok(_) => StepOutcome::success(),
                    Err(e) => StepOutcome::failed(e.to_string()),
                }
            }
            None => StepOutcome::skipped(),
        };

        let bidder_update = match winner {
            Some(winner) => match self.engine.source(&winner.bidder_id) {
                Some(source) => {
                    let feedback = AuctionFeedback {
                        request_id: auction.request_id.clone(),
                        campaign_id: winner.campaign_id.clone(),
                        clearing_price: auction.clearing_price,
                        won: true,
                    };
                    match source.send_feedback(&feedback).await {
                        Ok(()) => StepOutcome::success(),
                        Err(e) => StepOutcome::failed(e.to_string()),
                    }
                }
                None => StepOutcome::failed(format!("source {} unregistered", winner.bidder_id)),
            },
            None => StepOutcome::skipped(),
        };

        let supply_update = match (winner, &self.supply_client) {
            (Some(_), Some(client)) => {
                let fee_rate = self.engine.config().platform_fee_rate;
                let fee = (auction.clearing_price * fee_rate).round_dp(PRICE_SCALE);
                let report = DeliveryReport {
                    request_id: &auction.request_id,
                    price: auction.clearing_price,
                    publisher_revenue: auction.clearing_price - fee,
                };
                match client
                    .post_json::<_, serde_json::Value>("/delivery", &report)
                    .await
                {
                    Ok(_) => StepOutcome::success(),
                    Err(e) => StepOutcome::failed(e.to_string()),
                }
            }
            _ => StepOutcome::skipped(),
        };

        FeedbackReport {
            profile_update,
            bidder_update,
            supply_update,
        }
    }
}

fn simulate_visit(ctx: UserContext) -> VisitData {
    let mut rng = rand::thread_rng();

    let user_id = ctx
        .user_id
        .unwrap_or_else(|| format!("user-{:04}", rng.gen_range(0..10_000)));
    let device_type = ctx.device_type.unwrap_or_else(|| {
        *[DeviceType::Mobile, DeviceType::Desktop, DeviceType::Tablet]
            .choose(&mut rng)
            .unwrap_or(&DeviceType::Desktop)
    });
    let (os, browser) = match device_type {
        DeviceType::Mobile => ("Android", "Chrome Mobile"),
        DeviceType::Desktop => ("Windows", "Chrome"),
        DeviceType::Tablet => ("iPadOS", "Safari"),
    };
    let country = ctx.country.unwrap_or_else(|| {
        ["US", "GB", "DE"]
            .choose(&mut rng)
            .map_or_else(|| "US".to_string(), ToString::to_string)
    });
    let page_url = ctx.page_url.unwrap_or_else(|| {
        [
            "https://news.example.com/tech",
            "https://sports.example.com/scores",
            "https://recipes.example.com/dinner",
        ]
        .choose(&mut rng)
        .map_or_else(|| "https://news.example.com".to_string(), ToString::to_string)
    });

    VisitData {
        user_id,
        session_id: Uuid::new_v4().to_string(),
        page_url,
        referrer: "https://search.example.com".to_string(),
        device: Device {
            device_type,
            os: os.to_string(),
            browser: browser.to_string(),
            ip: format!("203.0.113.{}", rng.gen_range(1..255)),
        },
        geo: Geo {
            country,
            region: "region-1".to_string(),
            city: "Springfield".to_string(),
        },
        timestamp: Utc::now(),
    }
}
