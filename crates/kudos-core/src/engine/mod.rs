//! Engine facade.
//!
//! [`RewardEngine`] wires the catalog, activity store, clock, and ledger
//! together and exposes the operations the surrounding product calls:
//! listing achievements, computing claim status, claiming, reading balances
//! and history, redeeming, and maintaining the progress mirror.
//!
//! Only claims and redemptions mutate the ledger; every other operation is a
//! side-effect-free read and may run concurrently with in-flight claims.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::activity::ActivityStore;
use crate::balance::{BalanceError, BalanceReader};
use crate::catalog::{AchievementCatalog, AchievementDefinition, Recurrence};
use crate::claim::{ClaimCoordinator, ClaimError, ClaimKey, ClaimReceipt};
use crate::clock::{Clock, DayBoundary, SystemClock};
use crate::ledger::{LedgerError, ProgressRecord, RewardLedger, TransactionRecord};
use crate::progress::ProgressMirror;

/// Claim status of one achievement for one user.
///
/// `claimed_today` is meaningful for daily achievements, `unlocked` for
/// milestones; the other field stays `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AchievementStatus {
    /// The condition holds and the reward has not been granted this period.
    pub claimable: bool,

    /// Daily only: the reward was already granted today.
    pub claimed_today: bool,

    /// Milestone only: the reward was granted at some point.
    pub unlocked: bool,
}

/// Outcome of a redemption debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedemptionReceipt {
    /// The redeemed item.
    pub item: String,

    /// How many were redeemed.
    pub quantity: u32,

    /// Total cost debited from the wallet.
    pub cost: i64,

    /// The wallet balance after debiting.
    pub new_balance: i64,
}

/// The assembled reward engine.
pub struct RewardEngine {
    catalog: Arc<AchievementCatalog>,
    ledger: Arc<RewardLedger>,
    clock: Arc<dyn Clock>,
    coordinator: ClaimCoordinator,
}

impl RewardEngine {
    /// Assembles an engine with the system clock and a UTC day boundary.
    #[must_use]
    pub fn new(
        catalog: AchievementCatalog,
        store: Arc<dyn ActivityStore>,
        ledger: RewardLedger,
    ) -> Self {
        Self::with_clock(
            catalog,
            store,
            ledger,
            Arc::new(SystemClock),
            DayBoundary::utc(),
        )
    }

    /// Assembles an engine with an explicit clock and day-boundary policy.
    #[must_use]
    pub fn with_clock(
        catalog: AchievementCatalog,
        store: Arc<dyn ActivityStore>,
        ledger: RewardLedger,
        clock: Arc<dyn Clock>,
        day_boundary: DayBoundary,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let ledger = Arc::new(ledger);
        let coordinator = ClaimCoordinator::new(
            Arc::clone(&catalog),
            Arc::clone(&ledger),
            store,
            Arc::clone(&clock),
            day_boundary,
        );
        Self {
            catalog,
            ledger,
            clock,
            coordinator,
        }
    }

    /// All achievement definitions, in seed order.
    #[must_use]
    pub fn list_achievements(&self) -> &[AchievementDefinition] {
        self.catalog.list()
    }

    /// Claim status of one achievement for one user.
    ///
    /// An id absent from the catalog is "not yet earnable": the status is
    /// all-false, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger or activity store cannot be read.
    pub fn status(&self, user: &str, achievement_id: &str) -> Result<AchievementStatus, ClaimError> {
        let Some(def) = self.catalog.get(achievement_id) else {
            return Ok(AchievementStatus::default());
        };

        let key = ClaimKey::for_definition(user, def, self.coordinator.today());
        let claimed = self
            .ledger
            .claim_exists(user, &key.to_string())
            .map_err(ClaimError::Ledger)?;
        let eligible = self.coordinator.evaluator().evaluate(user, def)?;

        Ok(match def.recurrence {
            Recurrence::Daily => AchievementStatus {
                claimable: eligible && !claimed,
                claimed_today: claimed,
                unlocked: false,
            },
            Recurrence::Milestone => AchievementStatus {
                claimable: eligible && !claimed,
                claimed_today: false,
                unlocked: claimed,
            },
        })
    }

    /// Attempts to claim an achievement. See [`ClaimCoordinator::claim`].
    ///
    /// # Errors
    ///
    /// See [`ClaimError`].
    pub fn claim(&self, user: &str, achievement_id: &str) -> Result<ClaimReceipt, ClaimError> {
        self.coordinator.claim(user, achievement_id)
    }

    /// The user's current balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn balance(&self, user: &str) -> Result<i64, BalanceError> {
        BalanceReader::new(&self.ledger).current_balance(user)
    }

    /// Recomputes the balance from the full journal.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn recount(&self, user: &str) -> Result<i64, BalanceError> {
        BalanceReader::new(&self.ledger).full_recount(user)
    }

    /// Verifies cached balance against the recount, returning the agreed
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`BalanceError::Divergence`] if they disagree.
    pub fn verify_balance(&self, user: &str) -> Result<i64, BalanceError> {
        BalanceReader::new(&self.ledger).verify(user)
    }

    /// The user's most recent transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn history(&self, user: &str, limit: u64) -> Result<Vec<TransactionRecord>, LedgerError> {
        self.ledger.history(user, limit)
    }

    /// Debits the wallet for a redemption.
    ///
    /// The journal reason is `redeem:<item> x<quantity>`; it is an audit
    /// string, not an idempotency key, so repeated redemptions are fine.
    /// Overdrafts are refused without writing anything.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::InsufficientFunds`] on overdraft, or a ledger
    /// error if the append fails.
    pub fn redeem(
        &self,
        user: &str,
        item: &str,
        quantity: u32,
        unit_cost: u32,
    ) -> Result<RedemptionReceipt, ClaimError> {
        let cost = i64::from(quantity) * i64::from(unit_cost);
        let reason = format!("redeem:{item} x{quantity}");

        #[allow(clippy::cast_sign_loss)]
        let timestamp_ns = self.clock.now().timestamp_nanos_opt().unwrap_or(0) as u64;

        let appended = self
            .ledger
            .append_entry(user, -cost, &reason, timestamp_ns)
            .map_err(|err| match err {
                LedgerError::InsufficientFunds { balance, amount } => {
                    ClaimError::InsufficientFunds { balance, amount }
                },
                other => ClaimError::Ledger(other),
            })?;

        debug!(user, item, quantity, cost, "wallet debited");

        Ok(RedemptionReceipt {
            item: item.to_string(),
            quantity,
            cost,
            new_balance: appended.resulting_balance,
        })
    }

    /// Cached progress rows for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn progress(&self, user: &str) -> Result<Vec<ProgressRecord>, LedgerError> {
        ProgressMirror::new(&self.ledger, &self.catalog).snapshot(user)
    }

    /// Rebuilds the progress cache for a user from durable state.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read or written.
    pub fn rebuild_progress(&self, user: &str) -> Result<Vec<ProgressRecord>, LedgerError> {
        ProgressMirror::new(&self.ledger, &self.catalog)
            .rebuild(user, self.coordinator.today())
    }

    /// Adds `increment` to a user's progress row for an achievement,
    /// clamped to `[0, 1]`. Bookkeeping only; granting goes through
    /// [`Self::claim`].
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub fn bump_progress(
        &self,
        user: &str,
        achievement_id: &str,
        increment: f64,
    ) -> Result<(), LedgerError> {
        self.ledger.bump_progress(user, achievement_id, increment)
    }
}
