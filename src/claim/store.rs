//! Store Boundary
//!
//! The contract the orchestrator consumes from the reward ledger store. The
//! Postgres implementation lives in `crate::database`; tests substitute an
//! in-memory implementation of the same trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::eligibility::{RewardAccount, RewardKind};

/// A randomly selected owned-asset reference attached to a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRef {
    pub image_link: String,
    pub token_id: String,
    pub collection_id: i64,
}

/// Amount plus auxiliary metadata for one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimPayload {
    pub amount: f64,
    pub asset: Option<AssetRef>,
}

/// Result of a payload read. `NoAssetFound` is a distinguished marker, not
/// an error: the identity exists but owns no qualifying asset rows.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadLookup {
    Found(ClaimPayload),
    NoAssetFound,
    IdentityNotFound,
}

/// Result of a conditional cooldown-anchor commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitResult {
    Committed,
    /// The stored anchor no longer matches the observed value; a concurrent
    /// claim won the race.
    Conflict,
}

/// Per-collection flavor text attached to successful claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimQuote {
    pub group_name: String,
    pub description: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Reward ledger store consumed by the orchestrator. All mutation of
/// persisted reward state goes through this boundary.
#[async_trait]
pub trait RewardStore: Send + Sync {
    /// Read-only snapshot of the identity's reward state.
    async fn eligibility_snapshot(
        &self,
        identity: &str,
    ) -> Result<Option<RewardAccount>, StoreError>;

    /// Amount and auxiliary metadata for one claim of `kind`. The asset
    /// reference is picked uniformly among qualifying owned rows.
    async fn claim_payload(
        &self,
        identity: &str,
        kind: RewardKind,
    ) -> Result<PayloadLookup, StoreError>;

    /// Conditionally advance the cooldown anchor for (identity, kind).
    /// Succeeds only while the stored anchor still equals `observed`; a
    /// losing concurrent attempt sees `Conflict`.
    async fn commit_claim(
        &self,
        identity: &str,
        kind: RewardKind,
        anchor: DateTime<Utc>,
        observed: Option<DateTime<Utc>>,
    ) -> Result<CommitResult, StoreError>;

    /// Set the disqualifying flag for `kind`. Compare-and-set: returns true
    /// when this call flipped the flag, false when it was already set.
    async fn set_disqualifying_flag(
        &self,
        identity: &str,
        kind: RewardKind,
    ) -> Result<bool, StoreError>;

    /// Flavor text for the collection, falling back to the default group.
    async fn claim_quote(&self, collection_id: i64) -> Result<Option<ClaimQuote>, StoreError>;
}
