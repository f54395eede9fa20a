//! Application configuration sections with serde deserialization and
//! sensible defaults, loadable through [`crate::ConfigLoader`].

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::time::Duration;

/// Top-level configuration for every process in the system.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub exchange_server: ServerConfig,
    pub bidder_server: BidderServerConfig,
    pub auction: AuctionConfig,
    pub bidding: BiddingConfig,
    pub rpc: RpcConfig,
    pub monitor: MonitorConfig,
    pub peers: PeersConfig,
}

/// Bind address for the exchange HTTP surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8004,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Bind address for the bidder HTTP surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BidderServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for BidderServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8002,
        }
    }
}

impl BidderServerConfig {
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Auction timing and pricing rules.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AuctionConfig {
    /// Global deadline for a whole auction round.
    pub auction_timeout_ms: u64,
    /// Per-bidder response deadline inside the round.
    pub bidder_timeout_ms: u64,
    /// Second-price clearing when true, first-price otherwise.
    pub second_price: bool,
    /// Increment added to the second bid under second-price clearing.
    pub price_increment: Decimal,
    /// Share of the clearing price kept by the platform.
    pub platform_fee_rate: Decimal,
    /// Floor applied when a request does not carry one.
    pub default_floor_price: Decimal,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            auction_timeout_ms: 100,
            bidder_timeout_ms: 50,
            second_price: true,
            price_increment: dec!(0.01),
            platform_fee_rate: dec!(0.10),
            default_floor_price: dec!(0.01),
        }
    }
}

impl AuctionConfig {
    #[must_use]
    pub fn auction_timeout(&self) -> Duration {
        Duration::from_millis(self.auction_timeout_ms)
    }

    #[must_use]
    pub fn bidder_timeout(&self) -> Duration {
        Duration::from_millis(self.bidder_timeout_ms)
    }

    #[must_use]
    pub fn with_timeouts(mut self, auction_ms: u64, bidder_ms: u64) -> Self {
        self.auction_timeout_ms = auction_ms;
        self.bidder_timeout_ms = bidder_ms;
        self
    }

    #[must_use]
    pub fn with_second_price(mut self, enabled: bool) -> Self {
        self.second_price = enabled;
        self
    }
}

/// Bidding engine identity and price bounds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BiddingConfig {
    pub bidder_id: String,
    pub base_price: Decimal,
    pub min_bid: Decimal,
    pub max_bid: Decimal,
    /// Impressions per user per campaign per UTC day.
    pub daily_frequency_cap: u32,
}

impl Default for BiddingConfig {
    fn default() -> Self {
        Self {
            bidder_id: "dsp-001".to_string(),
            base_price: dec!(0.50),
            min_bid: dec!(0.01),
            max_bid: dec!(10.00),
            daily_frequency_cap: 3,
        }
    }
}

impl BiddingConfig {
    #[must_use]
    pub fn with_bidder_id(mut self, bidder_id: impl Into<String>) -> Self {
        self.bidder_id = bidder_id.into();
        self
    }

    #[must_use]
    pub fn with_price_bounds(mut self, min_bid: Decimal, max_bid: Decimal) -> Self {
        self.min_bid = min_bid;
        self.max_bid = max_bid;
        self
    }
}

/// Retry and circuit breaker settings for peer calls.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub timeout_ms: u64,
    /// Additional attempts after the first, on retryable failures only.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub backoff_factor: f64,
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time the circuit stays open before admitting a probe.
    pub recovery_timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            max_retries: 3,
            retry_delay_ms: 1000,
            backoff_factor: 2.0,
            failure_threshold: 5,
            recovery_timeout_ms: 30_000,
        }
    }
}

impl RpcConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    #[must_use]
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }

    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, retry_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    #[must_use]
    pub fn with_breaker(mut self, failure_threshold: u32, recovery_timeout_ms: u64) -> Self {
        self.failure_threshold = failure_threshold;
        self.recovery_timeout_ms = recovery_timeout_ms;
        self
    }
}

/// Health monitor cadence and alert thresholds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub check_interval_secs: u64,
    pub response_time_alert_ms: u64,
    pub failure_rate_alert: f64,
    pub consecutive_failure_alert: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
            response_time_alert_ms: 5000,
            failure_rate_alert: 0.5,
            consecutive_failure_alert: 3,
        }
    }
}

impl MonitorConfig {
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

/// A downstream bidder endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeerConfig {
    pub id: String,
    pub url: String,
}

/// Peer services the exchange talks to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PeersConfig {
    pub bidders: Vec<PeerConfig>,
    /// User profile service base URL, if deployed.
    pub profile_service: Option<String>,
    /// Supply-side service base URL, if deployed.
    pub supply_service: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auction_defaults_match_platform_contract() {
        let config = AuctionConfig::default();
        assert_eq!(config.auction_timeout_ms, 100);
        assert_eq!(config.bidder_timeout_ms, 50);
        assert!(config.second_price);
        assert_eq!(config.price_increment, dec!(0.01));
        assert_eq!(config.platform_fee_rate, dec!(0.10));
    }

    #[test]
    fn bidding_defaults_bound_prices() {
        let config = BiddingConfig::default();
        assert_eq!(config.base_price, dec!(0.50));
        assert!(config.min_bid < config.max_bid);
        assert_eq!(config.daily_frequency_cap, 3);
    }

    #[test]
    fn rpc_builders_override_defaults() {
        let config = RpcConfig::default()
            .with_retries(1, 10)
            .with_breaker(2, 1000);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.retry_delay(), Duration::from_millis(10));
        assert_eq!(config.failure_threshold, 2);
        assert_eq!(config.recovery_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn server_bind_addr_joins_host_and_port() {
        let server = ServerConfig::default();
        assert_eq!(server.bind_addr(), "127.0.0.1:8004");
    }

    #[test]
    fn app_config_deserializes_from_partial_toml() {
        let config: AppConfig = toml_from(
            r#"
            [auction]
            auction_timeout_ms = 250

            [[peers.bidders]]
            id = "dsp-001"
            url = "http://127.0.0.1:8002"
            "#,
        );
        assert_eq!(config.auction.auction_timeout_ms, 250);
        assert_eq!(config.auction.bidder_timeout_ms, 50);
        assert_eq!(config.peers.bidders.len(), 1);
        assert_eq!(config.peers.bidders[0].id, "dsp-001");
    }

    fn toml_from(raw: &str) -> AppConfig {
        use figment::providers::{Format, Toml};
        figment::Figment::new()
            .merge(Toml::string(raw))
            .extract()
            .unwrap()
    }
}
