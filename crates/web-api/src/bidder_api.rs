//! Bidder-side HTTP surface.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use adx_bidder::{BidderError, BiddingEngine};
use adx_core::{AuctionFeedback, BidRequest, Campaign, ErrorBody, UserProfile, WinNotice};
use adx_rpc::PeerClient;

/// Shared state behind the bidder router.
#[derive(Clone)]
pub struct BidderState {
    pub engine: Arc<BiddingEngine>,
    /// Profile service consulted when a bid request carries no profile.
    pub profile_client: Option<Arc<PeerClient>>,
}

/// Bid request body, optionally carrying the already-resolved profile.
#[derive(Debug, Deserialize)]
struct BidPayload {
    #[serde(flatten)]
    request: BidRequest,
    profile: Option<UserProfile>,
}

/// Builds the bidder router.
pub fn router(state: BidderState) -> Router {
    Router::new()
        .route("/bid", post(submit_bid))
        .route("/win-notice", post(win_notice))
        .route("/feedback", post(feedback))
        .route("/campaigns", get(list_campaigns).post(create_campaign))
        .route("/campaigns/:id", get(get_campaign).delete(delete_campaign))
        .route("/campaigns/:id/stats", get(campaign_stats))
        .route("/bid-history", get(bid_history))
        .route("/stats", get(get_stats))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn submit_bid(State(state): State<BidderState>, Json(payload): Json<BidPayload>) -> Response {
    let profile = match payload.profile {
        Some(profile) => Some(profile),
        None => match &state.profile_client {
            Some(client) => {
                let path = format!("/user/{}/profile", payload.request.user_id);
                match client.get_json::<UserProfile>(&path).await {
                    Ok(profile) => Some(profile),
                    Err(e) => {
                        tracing::debug!(error = %e, "profile lookup failed, bidding without one");
                        None
                    }
                }
            }
            None => None,
        },
    };

    match state.engine.evaluate(&payload.request, profile.as_ref()) {
        Ok(Some(bid)) => Json(bid).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorBody::new("invalid_bid_request", e.to_string())),
        )
            .into_response(),
    }
}

async fn win_notice(State(state): State<BidderState>, Json(notice): Json<WinNotice>) -> Response {
    match state.engine.record_win(&notice) {
        Ok(()) => Json(json!({"status": "success"})).into_response(),
        Err(e @ BidderError::BudgetExceeded { .. }) => {
            tracing::warn!(campaign = %notice.campaign_id, error = %e, "win notice rejected");
            (
                StatusCode::CONFLICT,
                Json(ErrorBody::new("budget_exceeded", e.to_string())),
            )
                .into_response()
        }
        Err(e @ BidderError::UnknownCampaign(_)) => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody::new("unknown_campaign", e.to_string())),
        )
            .into_response(),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorBody::new("invalid_win_notice", e.to_string())),
        )
            .into_response(),
    }
}

async fn feedback(Json(feedback): Json<AuctionFeedback>) -> Response {
    tracing::debug!(
        request = %feedback.request_id,
        campaign = %feedback.campaign_id,
        won = feedback.won,
        "auction feedback received"
    );
    Json(json!({"status": "received"})).into_response()
}

async fn list_campaigns(State(state): State<BidderState>) -> Response {
    Json(state.engine.store().list()).into_response()
}

async fn create_campaign(
    State(state): State<BidderState>,
    Json(campaign): Json<Campaign>,
) -> Response {
    let id = campaign.id.clone();
    match state.engine.store().insert(campaign) {
        Ok(()) => (StatusCode::CREATED, Json(json!({"status": "created", "id": id}))).into_response(),
        Err(e @ BidderError::DuplicateCampaign(_)) => (
            StatusCode::CONFLICT,
            Json(ErrorBody::new("duplicate_campaign", e.to_string())),
        )
            .into_response(),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorBody::new("invalid_campaign", e.to_string())),
        )
            .into_response(),
    }
}

async fn get_campaign(State(state): State<BidderState>, Path(id): Path<String>) -> Response {
    match state.engine.store().get(&id) {
        Some(campaign) => Json(campaign).into_response(),
        None => campaign_not_found(&id),
    }
}

async fn delete_campaign(State(state): State<BidderState>, Path(id): Path<String>) -> Response {
    match state.engine.store().remove(&id) {
        Ok(_) => Json(json!({"status": "deleted", "id": id})).into_response(),
        Err(_) => campaign_not_found(&id),
    }
}

async fn campaign_stats(State(state): State<BidderState>, Path(id): Path<String>) -> Response {
    match state.engine.store().stats(&id) {
        Some(stats) => Json(stats).into_response(),
        None => campaign_not_found(&id),
    }
}

async fn bid_history(State(state): State<BidderState>) -> Response {
    Json(state.engine.bid_history()).into_response()
}

async fn get_stats(State(state): State<BidderState>) -> Response {
    Json(state.engine.snapshot()).into_response()
}

async fn health(State(state): State<BidderState>) -> Response {
    Json(json!({
        "status": "healthy",
        "service": "bidder",
        "bidder_id": state.engine.bidder_id(),
        "active_campaigns": state.engine.store().serving().len(),
    }))
    .into_response()
}

fn campaign_not_found(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody::new("unknown_campaign", format!("campaign {id} not found"))),
    )
        .into_response()
}
