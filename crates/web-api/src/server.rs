//! HTTP server wrapper shared by the exchange and bidder surfaces.

use anyhow::Result;
use axum::Router;

use crate::bidder_api::{self, BidderState};
use crate::exchange_api::{self, ExchangeState};

/// A configured router ready to serve.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Exchange surface over the given state.
    #[must_use]
    pub fn exchange(state: ExchangeState) -> Self {
        Self {
            router: exchange_api::router(state),
        }
    }

    /// Bidder surface over the given state.
    #[must_use]
    pub fn bidder(state: BidderState) -> Self {
        Self {
            router: bidder_api::router(state),
        }
    }

    /// Binds and serves until the process exits.
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound or the server fails.
    pub async fn serve(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "HTTP server listening");
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}
