//! Exchange-side HTTP surface.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use adx_core::{BidRequest, ErrorBody};
use adx_exchange::{AuctionEngine, UserContext, WorkflowOrchestrator};
use adx_rpc::ServiceRegistry;

/// Shared state behind the exchange router.
#[derive(Clone)]
pub struct ExchangeState {
    pub engine: Arc<AuctionEngine>,
    pub orchestrator: Arc<WorkflowOrchestrator>,
    pub registry: Arc<ServiceRegistry>,
}

/// Builds the exchange router.
pub fn router(state: ExchangeState) -> Router {
    Router::new()
        .route("/rtb", post(run_auction))
        .route("/auction/:id", get(get_auction))
        .route("/stats", get(get_stats))
        .route("/workflow/run", post(run_workflow))
        .route("/workflow/stats", get(get_workflow_stats))
        .route("/services", get(list_services))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn run_auction(
    State(state): State<ExchangeState>,
    Json(request): Json<BidRequest>,
) -> Response {
    match state.engine.run_auction(request).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorBody::new("invalid_bid_request", e.to_string())),
        )
            .into_response(),
    }
}

async fn get_auction(State(state): State<ExchangeState>, Path(id): Path<String>) -> Response {
    match state.engine.auction(&id) {
        Some(result) => Json(result).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody::new("not_found", format!("auction {id} not found"))),
        )
            .into_response(),
    }
}

async fn get_stats(State(state): State<ExchangeState>) -> Response {
    Json(state.engine.stats().snapshot()).into_response()
}

async fn run_workflow(
    State(state): State<ExchangeState>,
    ctx: Option<Json<UserContext>>,
) -> Response {
    let run = state.orchestrator.execute(ctx.map(|Json(c)| c)).await;
    Json(run).into_response()
}

async fn get_workflow_stats(State(state): State<ExchangeState>) -> Response {
    Json(state.orchestrator.stats_snapshot()).into_response()
}

async fn list_services(State(state): State<ExchangeState>) -> Response {
    Json(state.registry.list()).into_response()
}

async fn health(State(state): State<ExchangeState>) -> Response {
    let stats = state.engine.stats().snapshot();
    Json(json!({
        "status": "healthy",
        "service": "ad-exchange",
        "exchange_id": state.engine.exchange_id(),
        "bidders": state.engine.source_count(),
        "total_auctions": stats.total_auctions,
    }))
    .into_response()
}
