//! Claim API Endpoints
//!
//! One endpoint per reward kind. Each orchestrator outcome maps to exactly
//! one user-facing message category; the front end never retries on behalf
//! of the caller.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::error;

use crate::claim::ClaimOutcome;
use crate::eligibility::RewardKind;
use crate::gateway::PaymentError;

use super::ApiState;

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub message: String,
    #[serde(flatten)]
    pub outcome: ClaimOutcome,
}

/// POST /claim/daily/:identity
pub async fn claim_daily(
    State(state): State<ApiState>,
    Path(identity): Path<String>,
) -> Result<(StatusCode, Json<ClaimResponse>), (StatusCode, String)> {
    run_claim(&state, &identity, RewardKind::Daily).await
}

/// POST /claim/biweekly/:identity
pub async fn claim_biweekly(
    State(state): State<ApiState>,
    Path(identity): Path<String>,
) -> Result<(StatusCode, Json<ClaimResponse>), (StatusCode, String)> {
    run_claim(&state, &identity, RewardKind::Biweekly).await
}

/// POST /claim/trait/:identity
pub async fn claim_trait(
    State(state): State<ApiState>,
    Path(identity): Path<String>,
) -> Result<(StatusCode, Json<ClaimResponse>), (StatusCode, String)> {
    run_claim(&state, &identity, RewardKind::TraitPenalty).await
}

/// POST /claim/amm/:identity
pub async fn claim_amm(
    State(state): State<ApiState>,
    Path(identity): Path<String>,
) -> Result<(StatusCode, Json<ClaimResponse>), (StatusCode, String)> {
    run_claim(&state, &identity, RewardKind::AmmBonus).await
}

async fn run_claim(
    state: &ApiState,
    identity: &str,
    kind: RewardKind,
) -> Result<(StatusCode, Json<ClaimResponse>), (StatusCode, String)> {
    if let Err(remaining) = state.limiter.check(identity) {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            format!("Please wait {}s between claim requests", remaining.as_secs()),
        ));
    }

    let outcome = state
        .orchestrator
        .claim(identity, kind)
        .await
        .map_err(|e| {
            error!(identity = %identity, kind = %kind, error = %e, "Claim failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Claim could not be processed".to_string(),
            )
        })?;

    let status = status_for(&outcome);
    let message = message_for(&outcome);
    Ok((status, Json(ClaimResponse { message, outcome })))
}

fn status_for(outcome: &ClaimOutcome) -> StatusCode {
    match outcome {
        ClaimOutcome::Completed { .. }
        | ClaimOutcome::NotReady { .. }
        | ClaimOutcome::BelowThreshold { .. } => StatusCode::OK,
        ClaimOutcome::Flagged => StatusCode::FORBIDDEN,
        ClaimOutcome::NotFound | ClaimOutcome::NoAssetFound => StatusCode::NOT_FOUND,
        ClaimOutcome::AlreadyInFlight => StatusCode::CONFLICT,
        ClaimOutcome::PaymentFailed { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn message_for(outcome: &ClaimOutcome) -> String {
    match outcome {
        ClaimOutcome::Completed {
            amount,
            reconciliation_required: false,
            ..
        } => format!("Reward of {} sent", amount),
        ClaimOutcome::Completed {
            amount,
            reconciliation_required: true,
            ..
        } => format!(
            "Reward of {} sent; record-keeping follow-up is pending",
            amount
        ),
        ClaimOutcome::NotReady { remaining } => {
            format!("Next claim available in {}", remaining)
        }
        ClaimOutcome::Flagged => "Rewards are disabled for this account this period".to_string(),
        ClaimOutcome::NotFound => "Identity is not registered for rewards".to_string(),
        ClaimOutcome::BelowThreshold { reason } => format!("Not eligible: {}", reason),
        ClaimOutcome::NoAssetFound => "No qualifying assets held".to_string(),
        ClaimOutcome::AlreadyInFlight => {
            "A claim for this reward is already being processed".to_string()
        }
        ClaimOutcome::PaymentFailed {
            error: PaymentError::TrustlineMissing,
        } => "Payout wallet is not configured for this currency".to_string(),
        ClaimOutcome::PaymentFailed { .. } => {
            "Payment could not be submitted; your claim is untouched, try again later".to_string()
        }
    }
}

/// Create the claim API router
pub fn create_claim_router(state: ApiState) -> Router {
    Router::new()
        .route("/daily/:identity", post(claim_daily))
        .route("/biweekly/:identity", post(claim_biweekly))
        .route("/trait/:identity", post(claim_trait))
        .route("/amm/:identity", post(claim_amm))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::RemainingTime;

    #[test]
    fn test_each_outcome_has_one_message_category() {
        let not_ready = ClaimOutcome::NotReady {
            remaining: RemainingTime::from_duration(chrono::Duration::seconds(3661)),
        };
        assert!(message_for(&not_ready).starts_with("Next claim available in"));
        assert_eq!(status_for(&not_ready), StatusCode::OK);

        let failed = ClaimOutcome::PaymentFailed {
            error: PaymentError::ConnectionExhausted { attempts: 3 },
        };
        assert!(message_for(&failed).contains("untouched"));
        assert_eq!(status_for(&failed), StatusCode::BAD_GATEWAY);

        let trustline = ClaimOutcome::PaymentFailed {
            error: PaymentError::TrustlineMissing,
        };
        assert!(message_for(&trustline).contains("not configured"));
    }

    #[test]
    fn test_reconciliation_changes_message_not_status() {
        let clean = ClaimOutcome::Completed {
            amount: 10.0,
            tx_hash: Some("ABC".to_string()),
            asset: None,
            quote: None,
            reconciliation_required: false,
        };
        let pending = ClaimOutcome::Completed {
            amount: 10.0,
            tx_hash: Some("ABC".to_string()),
            asset: None,
            quote: None,
            reconciliation_required: true,
        };
        assert_eq!(status_for(&clean), StatusCode::OK);
        assert_eq!(status_for(&pending), StatusCode::OK);
        assert_ne!(message_for(&clean), message_for(&pending));
    }
}
