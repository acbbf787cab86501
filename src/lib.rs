//! XRAIN Reward-Claim Coordinator
//!
//! Coordinates user-initiated reward claims settled on the XRP Ledger:
//! evaluates cooldown eligibility, submits the payment with bounded retry,
//! then commits the new cooldown anchor with a compare-and-set so racing
//! claims can never double-pay.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server entrypoint
//! ├── config.rs      - Configuration management
//! ├── eligibility/   - Pure eligibility evaluation
//! │   ├── schedule.rs  - Cooldown schedules (rolling / fixed-hour cutoff)
//! │   └── evaluator.rs - Snapshot -> eligibility decision
//! ├── gateway/       - External payment rail
//! │   ├── payment.rs - Gateway trait, requests, outcomes, errors
//! │   └── xrpl.rs    - XRPL JSON-RPC implementation with bounded retry
//! ├── claim/         - Claim orchestration
//! │   ├── locks.rs        - Advisory per-(identity, kind) locks
//! │   ├── store.rs        - Reward store boundary
//! │   └── orchestrator.rs - evaluate -> pay -> commit state machine
//! ├── api/           - HTTP endpoints (one per reward kind)
//! └── database/      - PostgreSQL persistence
//! ```

pub mod api;
pub mod claim;
pub mod config;
pub mod database;
pub mod eligibility;
pub mod gateway;

// Re-export main types for convenience
pub use api::{create_router, ApiState, RateLimiter};
pub use claim::{
    AssetRef, ClaimOrchestrator, ClaimOutcome, ClaimPayload, ClaimQuote, CommitResult,
    PayloadLookup, RewardStore, StoreError,
};
pub use config::{sanitize_for_logging, CoordinatorConfig, LedgerConfig, RewardsConfig};
pub use database::DatabasePool;
pub use eligibility::{
    evaluate, CooldownSchedule, EligibilityResult, RemainingTime, RewardAccount, RewardKind,
};
pub use gateway::{
    xrp_to_drops, CurrencySpec, LedgerGateway, PaymentError, PaymentOutcome, PaymentRequest,
    XrplGateway,
};
