//! PostgreSQL Database Module
//!
//! Persistent reward state: account rows with cooldown anchors and flags,
//! owned-asset rows, and collection quote text. The pool implements the
//! `RewardStore` boundary consumed by the claim orchestrator.

pub mod pool;
pub mod quotes;
pub mod rewards;

pub use pool::DatabasePool;
pub use quotes::QuoteRepository;
pub use rewards::RewardRepository;
