//! Domain types shared by the exchange, bidders, and workflow layers.
//!
//! Every monetary field is a [`rust_decimal::Decimal`]; prices on the wire
//! round to at most four decimal places. All boundary payloads carry a
//! `validate()` method that is called before the payload is acted on.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum decimal places allowed on any price field.
pub const PRICE_SCALE: u32 = 4;

// ============================================
// Bid request
// ============================================

/// Device class reported in a bid request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Desktop,
    Tablet,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mobile => write!(f, "mobile"),
            Self::Desktop => write!(f, "desktop"),
            Self::Tablet => write!(f, "tablet"),
        }
    }
}

/// Placement being auctioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdSlot {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub position: String,
    pub floor_price: Decimal,
}

impl AdSlot {
    /// Validates slot identifiers, dimensions, and floor price.
    ///
    /// # Errors
    /// Returns a `ValidationError` naming the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::new("ad_slot.id", "must not be empty"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ValidationError::new(
                "ad_slot.dimensions",
                "width and height must be positive",
            ));
        }
        if self.floor_price < Decimal::ZERO {
            return Err(ValidationError::new(
                "ad_slot.floor_price",
                "must not be negative",
            ));
        }
        Ok(())
    }
}

/// Device details for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub os: String,
    pub browser: String,
    pub ip: String,
}

/// Coarse geolocation for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geo {
    pub country: String,
    pub region: String,
    pub city: String,
}

/// A request for bids on a single impression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidRequest {
    pub id: String,
    pub user_id: String,
    pub ad_slot: AdSlot,
    pub device: Device,
    pub geo: Geo,
    pub timestamp: DateTime<Utc>,
}

impl BidRequest {
    /// Validates the request and its nested slot.
    ///
    /// # Errors
    /// Returns a `ValidationError` naming the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::new("id", "must not be empty"));
        }
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::new("user_id", "must not be empty"));
        }
        self.ad_slot.validate()
    }
}

// ============================================
// Bids and creatives
// ============================================

/// Creative rendered when a campaign wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creative {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Creative {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::new("creative.title", "must not be empty"));
        }
        Ok(())
    }
}

/// A bidder's response to a [`BidRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub request_id: String,
    pub price: Decimal,
    pub creative: Creative,
    pub campaign_id: String,
    pub bidder_id: String,
}

impl Bid {
    /// Validates the bid before it can enter an auction.
    ///
    /// # Errors
    /// Returns a `ValidationError` if the price is non-positive, carries more
    /// than four decimal places, or any identifier is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.request_id.trim().is_empty() {
            return Err(ValidationError::new("request_id", "must not be empty"));
        }
        if self.price <= Decimal::ZERO {
            return Err(ValidationError::new("price", "must be positive"));
        }
        if self.price.round_dp(PRICE_SCALE) != self.price {
            return Err(ValidationError::new(
                "price",
                "must have at most 4 decimal places",
            ));
        }
        if self.campaign_id.trim().is_empty() {
            return Err(ValidationError::new("campaign_id", "must not be empty"));
        }
        if self.bidder_id.trim().is_empty() {
            return Err(ValidationError::new("bidder_id", "must not be empty"));
        }
        self.creative.validate()
    }
}

// ============================================
// Campaigns
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
}

/// Audience and inventory constraints for a campaign. `None` means the
/// dimension is unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Targeting {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_types: Option<Vec<DeviceType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countries: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interests: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<String>>,
}

/// An advertiser campaign with a budget and targeting rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub advertiser_id: String,
    pub budget: Decimal,
    pub spent: Decimal,
    #[serde(default)]
    pub targeting: Targeting,
    pub creative: Creative,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Budget still available to spend.
    #[must_use]
    pub fn remaining_budget(&self) -> Decimal {
        self.budget - self.spent
    }

    /// Whether the campaign can currently serve.
    #[must_use]
    pub fn is_serving(&self) -> bool {
        self.status == CampaignStatus::Active && self.remaining_budget() > Decimal::ZERO
    }

    /// Validates budget invariants and identifiers.
    ///
    /// # Errors
    /// Returns a `ValidationError` naming the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::new("id", "must not be empty"));
        }
        if self.budget <= Decimal::ZERO {
            return Err(ValidationError::new("budget", "must be positive"));
        }
        if self.spent < Decimal::ZERO {
            return Err(ValidationError::new("spent", "must not be negative"));
        }
        if self.spent > self.budget {
            return Err(ValidationError::new("spent", "must not exceed budget"));
        }
        self.creative.validate()
    }
}

/// Delivery counters for a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignStats {
    pub campaign_id: String,
    pub impressions: u64,
    pub clicks: u64,
    pub spend: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl CampaignStats {
    #[must_use]
    pub fn empty(campaign_id: impl Into<String>) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            impressions: 0,
            clicks: 0,
            spend: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }
}

// ============================================
// User profiles
// ============================================

/// Audience profile attached to a user, served by the profile service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub interests: Vec<String>,
    pub behaviors: Vec<String>,
    pub segments: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl UserProfile {
    /// Fallback profile used when the profile service is unavailable.
    #[must_use]
    pub fn default_for(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            interests: vec!["general".to_string()],
            behaviors: vec!["new_visitor".to_string()],
            segments: vec!["general_audience".to_string()],
            last_updated: Utc::now(),
        }
    }

    /// Interest plus segment count, used for bid price scaling.
    #[must_use]
    pub fn richness(&self) -> usize {
        self.interests.len() + self.segments.len()
    }
}

// ============================================
// Auction outcomes
// ============================================

/// Notification sent to the winning bidder after an auction clears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinNotice {
    pub request_id: String,
    pub campaign_id: String,
    pub user_id: String,
    pub price: Decimal,
}

impl WinNotice {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.request_id.trim().is_empty() {
            return Err(ValidationError::new("request_id", "must not be empty"));
        }
        if self.campaign_id.trim().is_empty() {
            return Err(ValidationError::new("campaign_id", "must not be empty"));
        }
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::new("user_id", "must not be empty"));
        }
        if self.price <= Decimal::ZERO {
            return Err(ValidationError::new("price", "must be positive"));
        }
        Ok(())
    }
}

/// Post-auction feedback delivered to a bidder once a workflow completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionFeedback {
    pub request_id: String,
    pub campaign_id: String,
    pub clearing_price: Decimal,
    pub won: bool,
}

/// Outcome of a single auction, recorded in exchange history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionResult {
    pub auction_id: String,
    pub request_id: String,
    pub winning_bid: Option<Bid>,
    pub all_bids: Vec<Bid>,
    pub clearing_price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl AuctionResult {
    #[must_use]
    pub fn has_winner(&self) -> bool {
        self.winning_bid.is_some()
    }
}

// ============================================
// Health and error payloads
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Standard error payload returned by the HTTP surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_code: String,
    pub message: String,
}

impl ErrorBody {
    #[must_use]
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}
