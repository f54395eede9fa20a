pub mod engine;
pub mod error;
pub mod pricing;
pub mod store;
pub mod targeting;

pub use engine::{BidRecord, BiddingEngine, EngineSnapshot};
pub use error::BidderError;
pub use store::CampaignStore;
