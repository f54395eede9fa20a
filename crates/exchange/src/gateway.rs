//! Gateway between the exchange and one downstream bidder.
//!
//! Bid solicitation absorbs every failure into "no bid": a slow, broken, or
//! malformed bidder costs the auction one participant, never the auction
//! itself. Win notices surface their errors so the coordinator can count
//! delivery failures.

use async_trait::async_trait;

use adx_core::{AuctionFeedback, Bid, BidRequest, WinNotice};
use adx_rpc::{PeerClient, RpcError};

/// A participant the exchange can solicit bids from.
#[async_trait]
pub trait BidSource: Send + Sync {
    fn bidder_id(&self) -> &str;

    /// Solicits a bid. `None` covers both an explicit pass and any failure.
    async fn request_bid(&self, request: &BidRequest) -> Option<Bid>;

    /// Delivers a win notice.
    ///
    /// # Errors
    /// Returns the underlying `RpcError` on delivery failure.
    async fn send_win_notice(&self, notice: &WinNotice) -> Result<(), RpcError>;

    /// Delivers post-auction feedback.
    ///
    /// # Errors
    /// Returns the underlying `RpcError` on delivery failure.
    async fn send_feedback(&self, feedback: &AuctionFeedback) -> Result<(), RpcError>;
}

/// HTTP-backed bid source.
pub struct BidderGateway {
    client: PeerClient,
}

impl BidderGateway {
    #[must_use]
    pub fn new(client: PeerClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BidSource for BidderGateway {
    fn bidder_id(&self) -> &str {
        self.client.name()
    }

    async fn request_bid(&self, request: &BidRequest) -> Option<Bid> {
        match self.client.post_json_opt::<_, Bid>("/bid", request).await {
            Ok(Some(bid)) => {
                if bid.request_id != request.id {
                    tracing::warn!(
                        bidder = %self.bidder_id(),
                        expected = %request.id,
                        got = %bid.request_id,
                        "bid for wrong request discarded"
                    );
                    return None;
                }
                if let Err(e) = bid.validate() {
                    tracing::warn!(bidder = %self.bidder_id(), error = %e, "invalid bid discarded");
                    return None;
                }
                Some(bid)
            }
            Ok(None) => {
                tracing::debug!(bidder = %self.bidder_id(), request = %request.id, "bidder passed");
                None
            }
            Err(e) => {
                tracing::warn!(bidder = %self.bidder_id(), error = %e, "bid request failed");
                None
            }
        }
    }

    async fn send_win_notice(&self, notice: &WinNotice) -> Result<(), RpcError> {
        self.client
            .post_json::<_, serde_json::Value>("/win-notice", notice)
            .await
            .map(|_| ())
    }

    async fn send_feedback(&self, feedback: &AuctionFeedback) -> Result<(), RpcError> {
        self.client
            .post_json::<_, serde_json::Value>("/feedback", feedback)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adx_core::{AdSlot, Creative, Device, DeviceType, Geo, RpcConfig};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> BidRequest {
        BidRequest {
            id: "req-1".to_string(),
            user_id: "user-1".to_string(),
            ad_slot: AdSlot {
                id: "slot-1".to_string(),
                width: 300,
                height: 250,
                position: "top".to_string(),
                floor_price: dec!(0.10),
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

    fn bid_json(request_id: &str, price: &str) -> serde_json::Value {
        json!({
            "request_id": request_id,
            "price": price,
            "creative": {"title": "Sale"},
            "campaign_id": "camp-1",
            "bidder_id": "dsp-001"
        })
    }

    async fn gateway(server: &MockServer) -> BidderGateway {
        let config = RpcConfig::default().with_retries(0, 1);
        BidderGateway::new(PeerClient::new("dsp-001", server.uri(), &config).unwrap())
    }

    #[tokio::test]
    async fn valid_bid_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bid_json("req-1", "0.80")))
            .mount(&server)
            .await;

        let bid = gateway(&server).await.request_bid(&request()).await.unwrap();
        assert_eq!(bid.price, dec!(0.80));
        assert_eq!(bid.bidder_id, "dsp-001");
    }

    #[tokio::test]
    async fn no_bid_response_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bid"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        assert!(gateway(&server).await.request_bid(&request()).await.is_none());
    }

    #[tokio::test]
    async fn bid_for_wrong_request_is_discarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bid_json("req-other", "0.80")))
            .mount(&server)
            .await;

        assert!(gateway(&server).await.request_bid(&request()).await.is_none());
    }

    #[tokio::test]
    async fn invalid_price_is_discarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bid_json("req-1", "0")))
            .mount(&server)
            .await;

        assert!(gateway(&server).await.request_bid(&request()).await.is_none());
    }

    #[tokio::test]
    async fn bidder_failure_is_absorbed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bid"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(gateway(&server).await.request_bid(&request()).await.is_none());
    }

    #[tokio::test]
    async fn win_notice_failure_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/win-notice"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notice = WinNotice {
            request_id: "req-1".to_string(),
            campaign_id: "camp-1".to_string(),
            user_id: "user-1".to_string(),
            price: dec!(0.61),
        };
        assert!(gateway(&server).await.send_win_notice(&notice).await.is_err());
    }
}
