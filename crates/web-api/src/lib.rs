pub mod bidder_api;
pub mod exchange_api;
pub mod server;

pub use bidder_api::BidderState;
pub use exchange_api::ExchangeState;
pub use server::ApiServer;
