//! Governance Endpoints
//!
//! Operator-only mutations. Disqualifying flags are set here (or by external
//! pipelines writing to the store directly) and never cleared by the claim
//! path.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::eligibility::RewardKind;

use super::ApiState;

#[derive(Debug, Deserialize)]
pub struct SetFlagRequest {
    pub admin_api_key: String,
}

#[derive(Debug, Serialize)]
pub struct SetFlagResponse {
    pub identity: String,
    pub kind: RewardKind,
    /// True when this call flipped the flag, false when already set.
    pub changed: bool,
}

/// POST /admin/flag/:kind/:identity - Set a disqualifying flag
pub async fn set_flag(
    State(state): State<ApiState>,
    Path((kind, identity)): Path<(String, String)>,
    Json(payload): Json<SetFlagRequest>,
) -> Result<Json<SetFlagResponse>, (StatusCode, String)> {
    match &state.admin_api_key {
        Some(key) if *key == payload.admin_api_key => {}
        Some(_) => return Err((StatusCode::FORBIDDEN, "Invalid admin API key".to_string())),
        None => {
            return Err((
                StatusCode::FORBIDDEN,
                "Admin API key not configured".to_string(),
            ))
        }
    }

    let kind = parse_kind(&kind)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown reward kind: {}", kind)))?;

    let changed = state
        .store
        .set_disqualifying_flag(&identity, kind)
        .await
        .map_err(|e| {
            error!(identity = %identity, kind = %kind, error = %e, "Flag update failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Flag could not be updated".to_string(),
            )
        })?;

    info!(identity = %identity, kind = %kind, changed, "Disqualifying flag set");

    Ok(Json(SetFlagResponse {
        identity,
        kind,
        changed,
    }))
}

fn parse_kind(raw: &str) -> Option<RewardKind> {
    RewardKind::all().into_iter().find(|k| k.as_str() == raw)
}

/// Create the governance API router
pub fn create_admin_router(state: ApiState) -> Router {
    Router::new()
        .route("/flag/:kind/:identity", post(set_flag))
        .with_state(state)
}
