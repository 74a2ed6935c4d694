//! Reward ledger and achievement-claim engine.
//!
//! `kudos-core` decides three things for a gamified journaling product:
//! has a reward already been granted, is it earnable right now, and what
//! does granting it do to the balance. Engagement rewards are credited to a
//! virtual wallet whose balance is always a pure function of an immutable
//! transaction journal.
//!
//! # Architecture
//!
//! ```text
//! claim request --> ClaimCoordinator --> AchievementCatalog (definition)
//!                        |          --> EligibilityEvaluator --> ActivityStore
//!                        |          --> RewardLedger (idempotency + append)
//!                        v
//!                  ClaimReceipt (amount, new balance)
//! ```
//!
//! # Key Invariants
//!
//! - At most one transaction ever exists per `(user, achievement, period)`
//!   claim key, even under concurrent claims; the ledger's uniqueness
//!   constraint settles races.
//! - The balance equals the sum of all transaction amounts; the running
//!   balance cached on each row is an optimization that reconciliation can
//!   always re-derive.
//! - Milestone rewards are claimable once per account lifetime; daily
//!   rewards reset at the engine's single configured day boundary.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use kudos_core::activity::MemoryActivityStore;
//! use kudos_core::catalog::AchievementCatalog;
//! use kudos_core::engine::RewardEngine;
//! use kudos_core::ledger::RewardLedger;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryActivityStore::new());
//! let engine = RewardEngine::new(
//!     AchievementCatalog::builtin(),
//!     Arc::clone(&store) as Arc<dyn kudos_core::activity::ActivityStore>,
//!     RewardLedger::in_memory()?,
//! );
//!
//! store.record_photo("alice");
//! let receipt = engine.claim("alice", "photo_first")?;
//! assert_eq!(receipt.amount, 5);
//! assert_eq!(engine.balance("alice")?, 5);
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod balance;
pub mod catalog;
pub mod claim;
pub mod clock;
pub mod config;
pub mod eligibility;
pub mod engine;
pub mod ledger;
pub mod progress;

pub use activity::{ActivityError, ActivityStore, MemoryActivityStore};
pub use balance::{BalanceError, BalanceReader};
pub use catalog::{
    AchievementCatalog, AchievementDefinition, ActivityMetric, CatalogError, Condition,
    Recurrence, TimeOfDayBound,
};
pub use claim::{ClaimCoordinator, ClaimError, ClaimKey, ClaimReceipt, PeriodKey};
pub use clock::{Clock, DayBoundary, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use eligibility::EligibilityEvaluator;
pub use engine::{AchievementStatus, RedemptionReceipt, RewardEngine};
pub use ledger::{LedgerError, LedgerStats, ProgressRecord, RewardLedger, TransactionRecord};
pub use progress::ProgressMirror;
