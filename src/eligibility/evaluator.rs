//! Eligibility Evaluator
//!
//! `evaluate` is a pure function of the account snapshot, the reward kind,
//! the wall clock, and the kind's cooldown schedule. Calling it twice with
//! identical inputs yields identical results; all I/O stays with the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schedule::{CooldownSchedule, RemainingTime};
use super::RewardKind;

/// Per-identity reward state as read from the store.
///
/// The cooldown anchors move monotonically forward (a claim only advances
/// them) and the disqualifying flags, once set, are never cleared here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardAccount {
    /// Ledger address, primary key.
    pub identity: String,

    /// Last successful claim per kind. `None` means never claimed.
    pub daily_anchor: Option<DateTime<Utc>>,
    pub biweekly_anchor: Option<DateTime<Utc>>,
    pub trait_anchor: Option<DateTime<Utc>>,
    pub amm_anchor: Option<DateTime<Utc>>,

    /// Disqualifying flags. Set externally or by governance, never cleared
    /// by this service.
    pub reputation_flag: bool,
    pub trait_flag: bool,

    /// Cached reward amounts, recomputed by an external pipeline.
    pub biweekly_amount: i64,
    pub trait_amount: i64,
}

impl RewardAccount {
    pub fn anchor(&self, kind: RewardKind) -> Option<DateTime<Utc>> {
        match kind {
            RewardKind::Daily => self.daily_anchor,
            RewardKind::Biweekly => self.biweekly_anchor,
            RewardKind::TraitPenalty => self.trait_anchor,
            RewardKind::AmmBonus => self.amm_anchor,
        }
    }

    pub fn disqualified(&self, kind: RewardKind) -> bool {
        match kind {
            RewardKind::Daily | RewardKind::AmmBonus => false,
            RewardKind::Biweekly => self.reputation_flag,
            RewardKind::TraitPenalty => self.trait_flag,
        }
    }

    /// Cached amount for kinds whose value lives on the account row.
    fn cached_amount(&self, kind: RewardKind) -> Option<i64> {
        match kind {
            RewardKind::Biweekly => Some(self.biweekly_amount),
            // Legacy data can exceed the payout cap for this kind.
            RewardKind::TraitPenalty => Some(self.trait_amount.min(1)),
            RewardKind::Daily | RewardKind::AmmBonus => None,
        }
    }
}

/// Outcome of one eligibility check. Produced fresh on every call, never
/// cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EligibilityResult {
    /// Ready to claim. `amount` is present when the value is carried on the
    /// account row; kinds priced elsewhere (asset rows, external holdings)
    /// resolve it at payload fetch.
    Claimable { amount: Option<f64> },
    /// Cooldown still active.
    NotReady { remaining: RemainingTime },
    /// A disqualifying flag blocks this kind.
    Flagged,
    /// Identity unknown to the store.
    NotFound,
    /// Policy-level ineligibility (e.g. nothing accrued).
    BelowThreshold { reason: String },
}

/// Anchors at or before the epoch are the legacy "never claimed" sentinel.
fn is_never_claimed(anchor: DateTime<Utc>) -> bool {
    anchor.timestamp() <= 0
}

/// Evaluate claim eligibility. Pure and side-effect free.
pub fn evaluate(
    account: Option<&RewardAccount>,
    kind: RewardKind,
    now: DateTime<Utc>,
    schedule: &CooldownSchedule,
) -> EligibilityResult {
    let account = match account {
        Some(a) => a,
        None => return EligibilityResult::NotFound,
    };

    if account.disqualified(kind) {
        return EligibilityResult::Flagged;
    }

    if let Some(amount) = account.cached_amount(kind) {
        if amount <= 0 {
            return EligibilityResult::BelowThreshold {
                reason: "no accrued rewards for this period".to_string(),
            };
        }
    }

    let anchor = match account.anchor(kind) {
        Some(anchor) if !is_never_claimed(anchor) => anchor,
        _ => {
            return EligibilityResult::Claimable {
                amount: account.cached_amount(kind).map(|a| a as f64),
            }
        }
    };

    let next_eligible = schedule.next_eligible(anchor);
    if now >= next_eligible {
        EligibilityResult::Claimable {
            amount: account.cached_amount(kind).map(|a| a as f64),
        }
    } else {
        EligibilityResult::NotReady {
            remaining: RemainingTime::from_duration(next_eligible - now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn test_account(identity: &str) -> RewardAccount {
        RewardAccount {
            identity: identity.to_string(),
            daily_anchor: None,
            biweekly_anchor: None,
            trait_anchor: None,
            amm_anchor: None,
            reputation_flag: false,
            trait_flag: false,
            biweekly_amount: 25,
            trait_amount: 3,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_absent_account_is_not_found() {
        let schedule = CooldownSchedule::rolling_hours(24);
        assert_eq!(
            evaluate(None, RewardKind::Daily, now(), &schedule),
            EligibilityResult::NotFound
        );
    }

    #[test]
    fn test_null_anchor_is_claimable() {
        let schedule = CooldownSchedule::rolling_hours(24);
        let account = test_account("rTest1");
        assert_eq!(
            evaluate(Some(&account), RewardKind::Daily, now(), &schedule),
            EligibilityResult::Claimable { amount: None }
        );
    }

    #[test]
    fn test_epoch_sentinel_is_claimable() {
        let schedule = CooldownSchedule::rolling_hours(24);
        let mut account = test_account("rTest1");
        account.daily_anchor = Some(Utc.timestamp_opt(0, 0).unwrap());
        assert_eq!(
            evaluate(Some(&account), RewardKind::Daily, now(), &schedule),
            EligibilityResult::Claimable { amount: None }
        );
    }

    #[test]
    fn test_one_second_inside_cooldown_is_not_ready() {
        let schedule = CooldownSchedule::rolling_hours(24);
        let mut account = test_account("rTest1");
        account.daily_anchor = Some(now() - Duration::hours(24) + Duration::seconds(1));
        match evaluate(Some(&account), RewardKind::Daily, now(), &schedule) {
            EligibilityResult::NotReady { remaining } => {
                assert_eq!(remaining.total_seconds(), 1);
            }
            other => panic!("expected NotReady, got {:?}", other),
        }
    }

    #[test]
    fn test_one_second_past_cooldown_is_claimable() {
        let schedule = CooldownSchedule::rolling_hours(24);
        let mut account = test_account("rTest1");
        account.daily_anchor = Some(now() - Duration::hours(24) - Duration::seconds(1));
        assert!(matches!(
            evaluate(Some(&account), RewardKind::Daily, now(), &schedule),
            EligibilityResult::Claimable { .. }
        ));
    }

    #[test]
    fn test_exact_boundary_resolves_claimable() {
        let schedule = CooldownSchedule::rolling_hours(24);
        let mut account = test_account("rTest1");
        account.daily_anchor = Some(now() - Duration::hours(24));
        assert!(matches!(
            evaluate(Some(&account), RewardKind::Daily, now(), &schedule),
            EligibilityResult::Claimable { .. }
        ));
    }

    #[test]
    fn test_flag_blocks_regardless_of_anchor() {
        let schedule = CooldownSchedule::rolling_hours(24);
        let mut account = test_account("rTest1");
        account.reputation_flag = true;
        account.biweekly_anchor = None;
        assert_eq!(
            evaluate(Some(&account), RewardKind::Biweekly, now(), &schedule),
            EligibilityResult::Flagged
        );
        account.biweekly_anchor = Some(now() - Duration::days(30));
        assert_eq!(
            evaluate(Some(&account), RewardKind::Biweekly, now(), &schedule),
            EligibilityResult::Flagged
        );
    }

    #[test]
    fn test_zero_accrual_is_below_threshold() {
        let schedule = CooldownSchedule::rolling_hours(24);
        let mut account = test_account("rTest1");
        account.biweekly_amount = 0;
        assert!(matches!(
            evaluate(Some(&account), RewardKind::Biweekly, now(), &schedule),
            EligibilityResult::BelowThreshold { .. }
        ));
    }

    #[test]
    fn test_trait_amount_capped_at_one() {
        let schedule = CooldownSchedule::rolling_hours(24);
        let account = test_account("rTest1");
        assert_eq!(
            evaluate(Some(&account), RewardKind::TraitPenalty, now(), &schedule),
            EligibilityResult::Claimable { amount: Some(1.0) }
        );
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let schedule = CooldownSchedule::rolling_hours(48);
        let mut account = test_account("rTest1");
        account.daily_anchor = Some(now() - Duration::hours(12));
        let first = evaluate(Some(&account), RewardKind::Daily, now(), &schedule);
        let second = evaluate(Some(&account), RewardKind::Daily, now(), &schedule);
        assert_eq!(first, second);
    }

    #[test]
    fn test_fixed_hour_cutoff_boundary() {
        use chrono_tz::America::New_York;
        let schedule = CooldownSchedule::DailyCutoff {
            hour: 19,
            zone: New_York,
        };
        let mut account = test_account("rTest1");
        // Anchored just after yesterday's cutoff.
        account.biweekly_anchor = Some(
            New_York
                .with_ymd_and_hms(2024, 6, 9, 19, 5, 0)
                .unwrap()
                .with_timezone(&Utc),
        );

        let just_before = New_York
            .with_ymd_and_hms(2024, 6, 10, 18, 59, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert!(matches!(
            evaluate(Some(&account), RewardKind::Biweekly, just_before, &schedule),
            EligibilityResult::NotReady { .. }
        ));

        let at_cutoff = New_York
            .with_ymd_and_hms(2024, 6, 10, 19, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert!(matches!(
            evaluate(Some(&account), RewardKind::Biweekly, at_cutoff, &schedule),
            EligibilityResult::Claimable { .. }
        ));
    }
}
