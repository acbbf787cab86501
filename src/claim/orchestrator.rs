//! Claim Orchestrator
//!
//! Sequences one claim: evaluate eligibility, fetch the claim payload,
//! submit the payment, then commit the cooldown anchor with a compare-and-set
//! keyed on the anchor observed before payment. The advisory per-key lock is
//! held for the whole call and released on every exit path.
//!
//! Failure contract: a payment failure performs no store mutation, so the
//! user retries later at no cost. A commit failure after a settled payment
//! is reported to the caller as success and raises a reconciliation signal,
//! because the payment is irreversible.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::RewardsConfig;
use crate::eligibility::{evaluate, EligibilityResult, RemainingTime, RewardKind};
use crate::gateway::{LedgerGateway, PaymentError, PaymentOutcome, PaymentRequest};

use super::locks::ClaimLockRegistry;
use super::store::{
    AssetRef, ClaimQuote, CommitResult, PayloadLookup, RewardStore, StoreError,
};

/// Ephemeral state for one orchestration call. Never persisted.
#[derive(Debug, Clone)]
pub struct ClaimAttempt {
    pub identity: String,
    pub kind: RewardKind,
    pub requested_amount: f64,
    /// Per-call correlation id for log stitching.
    pub correlation: Uuid,
    /// Anchor value observed before payment; the commit is conditional on it.
    pub observed_anchor: Option<DateTime<Utc>>,
}

impl ClaimAttempt {
    /// Deterministic idempotency token carried in the payment memo. The same
    /// logical claim (same identity, kind, and observed anchor) produces the
    /// same token, so an operator can reconcile ambiguous outcomes by memo
    /// instead of resubmitting.
    pub fn idempotency_memo(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.identity.as_bytes());
        hasher.update(b"|");
        hasher.update(self.kind.as_str().as_bytes());
        hasher.update(b"|");
        let anchor_secs = self.observed_anchor.map(|a| a.timestamp()).unwrap_or(0);
        hasher.update(anchor_secs.to_be_bytes());
        let digest = hasher.finalize();
        format!("xrain-claim:{}:{}", self.kind, hex::encode(&digest[..8]))
    }
}

/// Terminal result of one claim call. Each variant maps to exactly one
/// user-facing message category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ClaimOutcome {
    /// Payment settled. `reconciliation_required` marks the paid-but-not-
    /// recorded state that needs operator follow-up.
    Completed {
        amount: f64,
        tx_hash: Option<String>,
        asset: Option<AssetRef>,
        quote: Option<ClaimQuote>,
        reconciliation_required: bool,
    },
    NotReady {
        remaining: RemainingTime,
    },
    Flagged,
    NotFound,
    BelowThreshold {
        reason: String,
    },
    /// The identity owns no qualifying asset rows.
    NoAssetFound,
    /// Another claim for the same (identity, kind) is already in flight;
    /// rejected before reaching the gateway.
    AlreadyInFlight,
    /// Payment did not settle; cooldown untouched, safe to retry later.
    PaymentFailed {
        error: PaymentError,
    },
}

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("store failure during claim: {0}")]
    Store(#[from] StoreError),
}

pub struct ClaimOrchestrator {
    store: Arc<dyn RewardStore>,
    gateway: Arc<dyn LedgerGateway>,
    locks: ClaimLockRegistry,
    rewards: RewardsConfig,
}

impl ClaimOrchestrator {
    pub fn new(
        store: Arc<dyn RewardStore>,
        gateway: Arc<dyn LedgerGateway>,
        rewards: RewardsConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            locks: ClaimLockRegistry::new(),
            rewards,
        }
    }

    /// Run one claim for (identity, kind). At most one payment submission
    /// happens per call; the gateway's internal retries are transport-level
    /// resubmissions of the same transaction, not duplicate payments.
    pub async fn claim(&self, identity: &str, kind: RewardKind) -> Result<ClaimOutcome, ClaimError> {
        let _guard = match self.locks.try_acquire(identity, kind) {
            Some(guard) => guard,
            None => {
                debug!(identity = %identity, kind = %kind, "Duplicate claim short-circuited");
                return Ok(ClaimOutcome::AlreadyInFlight);
            }
        };

        let correlation = Uuid::new_v4();
        let now = Utc::now();
        let schedule = self.rewards.schedule_for(kind);

        let snapshot = self.store.eligibility_snapshot(identity).await?;
        let eligibility = evaluate(snapshot.as_ref(), kind, now, &schedule);

        let cached_amount = match eligibility {
            EligibilityResult::Claimable { amount } => amount,
            EligibilityResult::NotReady { remaining } => {
                return Ok(ClaimOutcome::NotReady { remaining })
            }
            EligibilityResult::Flagged => return Ok(ClaimOutcome::Flagged),
            EligibilityResult::NotFound => return Ok(ClaimOutcome::NotFound),
            EligibilityResult::BelowThreshold { reason } => {
                return Ok(ClaimOutcome::BelowThreshold { reason })
            }
        };

        let observed_anchor = snapshot.as_ref().and_then(|a| a.anchor(kind));

        let (amount, asset) = match self.resolve_payload(identity, kind, cached_amount).await? {
            Resolved::Ready { amount, asset } => (amount, asset),
            Resolved::Terminal(outcome) => return Ok(outcome),
        };

        let attempt = ClaimAttempt {
            identity: identity.to_string(),
            kind,
            requested_amount: amount,
            correlation,
            observed_anchor,
        };

        info!(
            identity = %identity,
            kind = %kind,
            amount,
            correlation = %correlation,
            "Submitting reward payment"
        );

        let request = PaymentRequest {
            destination: identity.to_string(),
            amount,
            currency: self.rewards.payout_currency(),
            memo: Some(attempt.idempotency_memo()),
        };

        let (tx_hash, attempts) = match self.gateway.submit(&request).await {
            PaymentOutcome::Submitted { tx_hash, attempts } => (tx_hash, attempts),
            PaymentOutcome::Failed { error, attempts } => {
                // No value moved: the cooldown stays untouched so the user
                // can retry later at no cost.
                warn!(
                    identity = %identity,
                    kind = %kind,
                    error = %error,
                    attempts,
                    correlation = %correlation,
                    "Payment failed, no state committed"
                );
                return Ok(ClaimOutcome::PaymentFailed { error });
            }
        };

        let anchor = schedule.commit_anchor(Utc::now());
        let reconciliation_required = match self
            .store
            .commit_claim(identity, kind, anchor, observed_anchor)
            .await
        {
            Ok(CommitResult::Committed) => false,
            Ok(CommitResult::Conflict) => {
                error!(
                    identity = %identity,
                    kind = %kind,
                    amount,
                    tx_hash = ?tx_hash,
                    correlation = %correlation,
                    "Commit conflict after settled payment; reconciliation required"
                );
                true
            }
            Err(e) => {
                error!(
                    identity = %identity,
                    kind = %kind,
                    amount,
                    tx_hash = ?tx_hash,
                    correlation = %correlation,
                    error = %e,
                    "Commit failed after settled payment; reconciliation required"
                );
                true
            }
        };

        let quote = self.fetch_quote(&asset).await;

        info!(
            identity = %identity,
            kind = %kind,
            amount,
            attempts,
            tx_hash = ?tx_hash,
            reconciliation_required,
            correlation = %correlation,
            "Claim complete"
        );

        Ok(ClaimOutcome::Completed {
            amount,
            tx_hash,
            asset,
            quote,
            reconciliation_required,
        })
    }

    /// Resolve the final amount and asset reference for a claimable kind.
    async fn resolve_payload(
        &self,
        identity: &str,
        kind: RewardKind,
        cached_amount: Option<f64>,
    ) -> Result<Resolved, ClaimError> {
        match kind {
            RewardKind::Daily => match self.store.claim_payload(identity, kind).await? {
                PayloadLookup::Found(payload) => Ok(Resolved::Ready {
                    amount: payload.amount,
                    asset: payload.asset,
                }),
                PayloadLookup::NoAssetFound => Ok(Resolved::Terminal(ClaimOutcome::NoAssetFound)),
                PayloadLookup::IdentityNotFound => Ok(Resolved::Terminal(ClaimOutcome::NotFound)),
            },
            RewardKind::Biweekly | RewardKind::TraitPenalty => {
                // Amount is carried on the account row and already resolved
                // by the evaluator; the payload only contributes the asset.
                let amount = match cached_amount {
                    Some(amount) => amount,
                    None => {
                        return Ok(Resolved::Terminal(ClaimOutcome::BelowThreshold {
                            reason: "no accrued rewards for this period".to_string(),
                        }))
                    }
                };
                let asset = match self.store.claim_payload(identity, kind).await? {
                    PayloadLookup::Found(payload) => payload.asset,
                    PayloadLookup::NoAssetFound | PayloadLookup::IdentityNotFound => None,
                };
                Ok(Resolved::Ready { amount, asset })
            }
            RewardKind::AmmBonus => {
                let balance = match self
                    .gateway
                    .query_external_balance(identity, self.rewards.amm_token())
                    .await
                {
                    Ok(balance) => balance,
                    Err(error) => {
                        return Ok(Resolved::Terminal(ClaimOutcome::PaymentFailed { error }))
                    }
                };
                match balance {
                    None => Ok(Resolved::Terminal(ClaimOutcome::BelowThreshold {
                        reason: "no external token holdings".to_string(),
                    })),
                    Some(held) if held < self.rewards.amm_min_balance => {
                        Ok(Resolved::Terminal(ClaimOutcome::BelowThreshold {
                            reason: format!(
                                "holdings {} below minimum {}",
                                held, self.rewards.amm_min_balance
                            ),
                        }))
                    }
                    Some(held) => Ok(Resolved::Ready {
                        amount: held * self.rewards.amm_rate,
                        asset: None,
                    }),
                }
            }
        }
    }

    /// Best-effort quote lookup; a missing or failing quote never fails the
    /// claim.
    async fn fetch_quote(&self, asset: &Option<AssetRef>) -> Option<ClaimQuote> {
        let collection_id = asset.as_ref().map(|a| a.collection_id).unwrap_or(0);
        match self.store.claim_quote(collection_id).await {
            Ok(quote) => quote,
            Err(e) => {
                debug!(collection_id, error = %e, "Quote lookup failed");
                None
            }
        }
    }
}

enum Resolved {
    Ready { amount: f64, asset: Option<AssetRef> },
    Terminal(ClaimOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::store::ClaimPayload;
    use crate::eligibility::RewardAccount;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct FixtureStore {
        account: Mutex<Option<RewardAccount>>,
        payload: PayloadLookup,
        commit_result: CommitResult,
        commits: AtomicU32,
    }

    impl FixtureStore {
        fn with_account(account: RewardAccount) -> Self {
            Self {
                account: Mutex::new(Some(account)),
                payload: PayloadLookup::Found(ClaimPayload {
                    amount: 10.0,
                    asset: Some(AssetRef {
                        image_link: "https://img.example/nft.png".to_string(),
                        token_id: "token-1".to_string(),
                        collection_id: 7,
                    }),
                }),
                commit_result: CommitResult::Committed,
                commits: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl RewardStore for FixtureStore {
        async fn eligibility_snapshot(
            &self,
            _identity: &str,
        ) -> Result<Option<RewardAccount>, StoreError> {
            Ok(self.account.lock().unwrap().clone())
        }

        async fn claim_payload(
            &self,
            _identity: &str,
            _kind: RewardKind,
        ) -> Result<PayloadLookup, StoreError> {
            Ok(self.payload.clone())
        }

        async fn commit_claim(
            &self,
            _identity: &str,
            _kind: RewardKind,
            _anchor: DateTime<Utc>,
            _observed: Option<DateTime<Utc>>,
        ) -> Result<CommitResult, StoreError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(self.commit_result)
        }

        async fn set_disqualifying_flag(
            &self,
            _identity: &str,
            _kind: RewardKind,
        ) -> Result<bool, StoreError> {
            Ok(true)
        }

        async fn claim_quote(&self, _collection_id: i64) -> Result<Option<ClaimQuote>, StoreError> {
            Ok(None)
        }
    }

    struct FixtureGateway {
        outcome: PaymentOutcome,
        submissions: AtomicU32,
    }

    impl FixtureGateway {
        fn submitting() -> Self {
            Self {
                outcome: PaymentOutcome::Submitted {
                    tx_hash: Some("ABC123".to_string()),
                    attempts: 1,
                },
                submissions: AtomicU32::new(0),
            }
        }

        fn failing(error: PaymentError) -> Self {
            Self {
                outcome: PaymentOutcome::Failed { error, attempts: 3 },
                submissions: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl LedgerGateway for FixtureGateway {
        async fn submit(&self, _request: &PaymentRequest) -> PaymentOutcome {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }

        async fn query_external_balance(
            &self,
            _identity: &str,
            _token: &str,
        ) -> Result<Option<f64>, PaymentError> {
            Ok(Some(100.0))
        }
    }

    fn fresh_account(identity: &str) -> RewardAccount {
        RewardAccount {
            identity: identity.to_string(),
            daily_anchor: None,
            biweekly_anchor: None,
            trait_anchor: None,
            amm_anchor: None,
            reputation_flag: false,
            trait_flag: false,
            biweekly_amount: 25,
            trait_amount: 1,
        }
    }

    fn orchestrator(
        store: Arc<FixtureStore>,
        gateway: Arc<FixtureGateway>,
    ) -> ClaimOrchestrator {
        ClaimOrchestrator::new(store, gateway, RewardsConfig::default())
    }

    #[tokio::test]
    async fn test_fresh_account_completes() {
        let store = Arc::new(FixtureStore::with_account(fresh_account("rAbc")));
        let gateway = Arc::new(FixtureGateway::submitting());
        let orch = orchestrator(store.clone(), gateway.clone());

        let outcome = orch.claim("rAbc", RewardKind::Daily).await.unwrap();
        match outcome {
            ClaimOutcome::Completed {
                amount,
                reconciliation_required,
                ..
            } => {
                assert_eq!(amount, 10.0);
                assert!(!reconciliation_required);
            }
            other => panic!("expected Completed, got {:?}", other),
        }
        assert_eq!(gateway.submissions.load(Ordering::SeqCst), 1);
        assert_eq!(store.commits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_identity_never_reaches_gateway() {
        let store = Arc::new(FixtureStore::with_account(fresh_account("rAbc")));
        *store.account.lock().unwrap() = None;
        let gateway = Arc::new(FixtureGateway::submitting());
        let orch = orchestrator(store, gateway.clone());

        let outcome = orch.claim("rNope", RewardKind::Daily).await.unwrap();
        assert_eq!(outcome, ClaimOutcome::NotFound);
        assert_eq!(gateway.submissions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_asset_blocks_before_payment() {
        let mut store = FixtureStore::with_account(fresh_account("rAbc"));
        store.payload = PayloadLookup::NoAssetFound;
        let store = Arc::new(store);
        let gateway = Arc::new(FixtureGateway::submitting());
        let orch = orchestrator(store.clone(), gateway.clone());

        let outcome = orch.claim("rAbc", RewardKind::Daily).await.unwrap();
        assert_eq!(outcome, ClaimOutcome::NoAssetFound);
        assert_eq!(gateway.submissions.load(Ordering::SeqCst), 0);
        assert_eq!(store.commits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_payment_failure_commits_nothing() {
        let store = Arc::new(FixtureStore::with_account(fresh_account("rAbc")));
        let gateway = Arc::new(FixtureGateway::failing(PaymentError::ConnectionExhausted {
            attempts: 3,
        }));
        let orch = orchestrator(store.clone(), gateway);

        let outcome = orch.claim("rAbc", RewardKind::Daily).await.unwrap();
        assert!(matches!(outcome, ClaimOutcome::PaymentFailed { .. }));
        assert_eq!(store.commits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_commit_conflict_reports_reconciliation() {
        let mut store = FixtureStore::with_account(fresh_account("rAbc"));
        store.commit_result = CommitResult::Conflict;
        let store = Arc::new(store);
        let gateway = Arc::new(FixtureGateway::submitting());
        let orch = orchestrator(store, gateway);

        let outcome = orch.claim("rAbc", RewardKind::Daily).await.unwrap();
        match outcome {
            ClaimOutcome::Completed {
                reconciliation_required,
                ..
            } => assert!(reconciliation_required),
            other => panic!("expected Completed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_flagged_account_is_blocked() {
        let mut account = fresh_account("rAbc");
        account.reputation_flag = true;
        let store = Arc::new(FixtureStore::with_account(account));
        let gateway = Arc::new(FixtureGateway::submitting());
        let orch = orchestrator(store, gateway.clone());

        let outcome = orch.claim("rAbc", RewardKind::Biweekly).await.unwrap();
        assert_eq!(outcome, ClaimOutcome::Flagged);
        assert_eq!(gateway.submissions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_idempotency_memo_is_stable() {
        let attempt = ClaimAttempt {
            identity: "rAbc".to_string(),
            kind: RewardKind::Daily,
            requested_amount: 10.0,
            correlation: Uuid::new_v4(),
            observed_anchor: None,
        };
        let again = ClaimAttempt {
            correlation: Uuid::new_v4(),
            ..attempt.clone()
        };
        assert_eq!(attempt.idempotency_memo(), again.idempotency_memo());
        assert!(attempt.idempotency_memo().starts_with("xrain-claim:daily:"));
    }
}
