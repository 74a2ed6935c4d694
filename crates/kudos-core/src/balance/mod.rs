//! Balance derivation and reconciliation.
//!
//! The balance is a pure function of the journal: the cached running balance
//! on the latest transaction is a fast path, and [`BalanceReader::verify`]
//! recomputes the full sum to prove the two agree. Divergence is a
//! correctness bug, never expected drift.

use thiserror::Error;
use tracing::warn;

use crate::ledger::{LedgerError, RewardLedger};

/// Errors from balance reads and reconciliation.
#[derive(Debug, Error)]
pub enum BalanceError {
    /// Error from the ledger.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The cached running balance disagrees with the recomputed sum.
    #[error("balance divergence for {user}: cached {cached}, recomputed {recomputed}")]
    Divergence {
        /// The user whose balance diverged.
        user: String,
        /// Running balance on the latest transaction.
        cached: i64,
        /// Sum of all transaction amounts.
        recomputed: i64,
    },
}

/// Derives balances from the reward ledger.
pub struct BalanceReader<'a> {
    ledger: &'a RewardLedger,
}

impl<'a> BalanceReader<'a> {
    /// Creates a reader over the given ledger.
    #[must_use]
    pub const fn new(ledger: &'a RewardLedger) -> Self {
        Self { ledger }
    }

    /// The user's current balance: the running balance on the most recent
    /// transaction, or 0 if none exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn current_balance(&self, user: &str) -> Result<i64, BalanceError> {
        Ok(self.ledger.latest_resulting_balance(user)?.unwrap_or(0))
    }

    /// Recomputes the balance by summing every transaction amount.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn full_recount(&self, user: &str) -> Result<i64, BalanceError> {
        Ok(self.ledger.sum_amounts(user)?)
    }

    /// Verifies that the cached balance equals the recount, returning the
    /// agreed value.
    ///
    /// # Errors
    ///
    /// Returns [`BalanceError::Divergence`] if the two disagree.
    pub fn verify(&self, user: &str) -> Result<i64, BalanceError> {
        let cached = self.current_balance(user)?;
        let recomputed = self.full_recount(user)?;

        if cached != recomputed {
            warn!(user, cached, recomputed, "balance divergence detected");
            return Err(BalanceError::Divergence {
                user: user.to_string(),
                cached,
                recomputed,
            });
        }

        Ok(cached)
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_balance_of_unknown_user_is_zero() {
        let ledger = RewardLedger::in_memory().unwrap();
        let reader = BalanceReader::new(&ledger);

        assert_eq!(reader.current_balance("nobody").unwrap(), 0);
        assert_eq!(reader.full_recount("nobody").unwrap(), 0);
        assert_eq!(reader.verify("nobody").unwrap(), 0);
    }

    #[test]
    fn test_verify_after_mixed_entries() {
        let ledger = RewardLedger::in_memory().unwrap();
        ledger.append_claim("alice", 10, "ach:first_diary", 1).unwrap();
        ledger.append_claim("alice", 20, "ach:third_diary", 2).unwrap();
        ledger.append_entry("alice", -5, "redeem:sticker x1", 3).unwrap();

        let reader = BalanceReader::new(&ledger);
        assert_eq!(reader.verify("alice").unwrap(), 25);
    }
}
