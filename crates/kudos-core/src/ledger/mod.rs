//! Reward ledger storage layer.
//!
//! This module provides the append-only wallet journal backed by `SQLite`
//! with WAL mode for concurrent reads. The journal is the sole durable source
//! of truth for balances and claim history: rows are only ever added, never
//! updated or deleted, and the running balance stored on each row is an
//! optimization that must always equal the recomputed sum.
//!
//! # Features
//!
//! - **Append-only semantics**: transactions can only be added, never
//!   modified or deleted
//! - **Idempotency index**: a separate `claim_keys` table gives O(1)
//!   "already claimed" lookup and carries the uniqueness constraint that
//!   settles claim races
//! - **WAL mode**: concurrent read access while writes are in progress
//! - **Progress mirror**: a rebuildable `achievement_progress` cache kept in
//!   the same database, never authoritative
//!
//! # Example
//!
//! ```rust,no_run
//! use kudos_core::ledger::RewardLedger;
//!
//! # fn example() -> Result<(), kudos_core::ledger::LedgerError> {
//! let ledger = RewardLedger::open("/path/to/wallet.db")?;
//!
//! // Credit a claim, guarded by its idempotency key.
//! let appended = ledger.append_claim("alice", 10, "ach:first_diary", 0)?;
//! assert_eq!(appended.resulting_balance, 10);
//!
//! // Balance is derivable from history at any time.
//! assert_eq!(ledger.sum_amounts("alice")?, 10);
//! # Ok(())
//! # }
//! ```

mod storage;


pub use storage::{
    AppendedTransaction, LedgerError, LedgerStats, ProgressRecord, RewardLedger,
    SqliteRewardLedger, TransactionRecord,
};
