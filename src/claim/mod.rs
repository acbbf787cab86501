//! Claim Orchestration
//!
//! The settlement core: one orchestration call runs the state machine
//! `evaluate -> fetch payload -> pay -> commit`, with the concurrency
//! contract that makes it safe:
//!
//! - an advisory per-(identity, kind) lock short-circuits concurrent
//!   duplicates before they reach the gateway;
//! - the cooldown commit is a compare-and-set keyed on the anchor observed
//!   before payment, so a losing racer can never overwrite a winner;
//! - a commit failure after a settled payment is surfaced as success plus a
//!   reconciliation signal; the payment is irreversible and is never
//!   resubmitted.

mod locks;
mod orchestrator;
mod store;

pub use locks::{ClaimLockGuard, ClaimLockRegistry};
pub use orchestrator::{ClaimAttempt, ClaimError, ClaimOrchestrator, ClaimOutcome};
pub use store::{
    AssetRef, ClaimPayload, ClaimQuote, CommitResult, PayloadLookup, RewardStore, StoreError,
};
