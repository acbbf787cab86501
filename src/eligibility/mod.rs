//! Eligibility Evaluation
//!
//! Pure claim-eligibility logic: given a persisted account snapshot, a reward
//! kind, the current time, and the kind's cooldown schedule, produce a tagged
//! `EligibilityResult`. No I/O happens here, which is what makes the rules
//! independently testable.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐     ┌──────────────────┐     ┌───────────────────┐
//! │ RewardAccount  │────►│ evaluate()        │────►│ EligibilityResult │
//! │ (store snapshot)│     │ (pure function)   │     │ (tagged variant)  │
//! └────────────────┘     └──────────────────┘     └───────────────────┘
//!                                ▲
//!                        ┌──────────────────┐
//!                        │ CooldownSchedule │
//!                        │ (rolling / daily │
//!                        │  fixed-hour)     │
//!                        └──────────────────┘
//! ```

mod evaluator;
mod schedule;

pub use evaluator::{evaluate, EligibilityResult, RewardAccount};
pub use schedule::{CooldownSchedule, RemainingTime};

use serde::{Deserialize, Serialize};

/// The independent reward kinds coordinated by this service.
///
/// Each kind has its own cooldown anchor and schedule; some kinds are
/// additionally gated by a disqualifying flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    /// Daily bonus, rolling cooldown, amount read from owned-asset rows.
    Daily,
    /// Bi-weekly reputation bonus, blocked by the reputation flag.
    Biweekly,
    /// Trait penalty payout, blocked by the trait flag.
    TraitPenalty,
    /// AMM participation bonus, amount derived from external token holdings.
    AmmBonus,
}

impl RewardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardKind::Daily => "daily",
            RewardKind::Biweekly => "biweekly",
            RewardKind::TraitPenalty => "trait_penalty",
            RewardKind::AmmBonus => "amm_bonus",
        }
    }

    pub fn all() -> [RewardKind; 4] {
        [
            RewardKind::Daily,
            RewardKind::Biweekly,
            RewardKind::TraitPenalty,
            RewardKind::AmmBonus,
        ]
    }
}

impl std::fmt::Display for RewardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
