pub mod config;
pub mod config_loader;
pub mod error;
pub mod models;

pub use config::{
    AppConfig, AuctionConfig, BidderServerConfig, BiddingConfig, MonitorConfig, PeerConfig,
    PeersConfig, RpcConfig, ServerConfig,
};
pub use config_loader::ConfigLoader;
pub use error::ValidationError;
pub use models::{
    AdSlot, AuctionFeedback, AuctionResult, Bid, BidRequest, Campaign, CampaignStats,
    CampaignStatus, Creative, Device, DeviceType, ErrorBody, Geo, HealthStatus, Targeting,
    UserProfile, WinNotice,
};
