//! HTTP API for the reward-claim coordinator
//!
//! One claim endpoint per reward kind, a governance endpoint for
//! disqualifying flags, a health probe, and a per-caller request throttle.
//! Handlers translate orchestrator outcomes into message categories and
//! never retry payments themselves.

pub mod admin;
pub mod claim;
pub mod limit;

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::claim::{ClaimOrchestrator, RewardStore};

pub use admin::{create_admin_router, SetFlagResponse};
pub use claim::{create_claim_router, ClaimResponse};
pub use limit::RateLimiter;

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<ClaimOrchestrator>,
    pub store: Arc<dyn RewardStore>,
    pub limiter: Arc<RateLimiter>,
    pub admin_api_key: Option<String>,
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Assemble the full application router.
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/claim", create_claim_router(state.clone()))
        .nest("/admin", create_admin_router(state))
}
