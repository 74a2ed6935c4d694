//! Claim coordination.
//!
//! [`ClaimCoordinator::claim`] turns a claim request into at most one ledger
//! transaction. The checks run in a fixed order so callers get stable error
//! precedence: unknown id, then already-claimed, then not-eligible, then the
//! defensive reward-amount guard. The append itself is guarded by the
//! ledger's claim-key uniqueness constraint, so two racing claims for the
//! same `(user, achievement, period)` cannot both commit; the loser's
//! storage conflict is translated to [`ClaimError::AlreadyClaimed`].

// Timestamps won't overflow u64 until the year 2554.
#![allow(clippy::cast_sign_loss)]

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::activity::{ActivityError, ActivityStore};
use crate::catalog::{AchievementCatalog, AchievementDefinition, Recurrence};
use crate::clock::{Clock, DayBoundary};
use crate::eligibility::EligibilityEvaluator;
use crate::ledger::{LedgerError, ProgressRecord, RewardLedger};

/// Errors a claim attempt can end in.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClaimError {
    /// No such achievement in the catalog. Non-retryable as issued.
    #[error("unknown achievement: {achievement_id}")]
    NotFound {
        /// The unrecognized id.
        achievement_id: String,
    },

    /// The reward was already granted for this period. An expected outcome
    /// of duplicate or retried requests, not an anomaly.
    #[error("already claimed: {claim_key}")]
    AlreadyClaimed {
        /// The idempotency key that was already recorded.
        claim_key: String,
    },

    /// The achievement's condition does not hold yet. Retryable later.
    #[error("condition not met for achievement: {achievement_id}")]
    NotEligible {
        /// The achievement whose condition failed.
        achievement_id: String,
    },

    /// The catalog entry grants nothing. A server-side misconfiguration,
    /// never user-caused.
    #[error("no reward configured for achievement: {achievement_id}")]
    NoReward {
        /// The misconfigured achievement.
        achievement_id: String,
    },

    /// A debit would overdraw the wallet.
    #[error("insufficient funds: balance {balance}, change {amount}")]
    InsufficientFunds {
        /// Balance before the refused entry.
        balance: i64,
        /// The refused amount.
        amount: i64,
    },

    /// The activity store could not confirm eligibility. Transient; nothing
    /// was appended.
    #[error("activity store error: {0}")]
    Activity(#[from] ActivityError),

    /// Unexpected ledger failure.
    #[error("ledger error: {0}")]
    Ledger(LedgerError),
}

/// The period a claim is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodKey {
    /// Once per account lifetime.
    Milestone,
    /// Once per calendar day.
    Day(NaiveDate),
}

/// The `(user, achievement, period)` idempotency key.
///
/// Its rendered form is simultaneously the audit reason on the journal row
/// and the deduplication key in the ledger index, so the format is
/// correctness-critical, not cosmetic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClaimKey {
    /// The claiming user.
    pub user_id: String,

    /// The achievement being claimed.
    pub achievement_id: String,

    /// The period the claim is scoped to.
    pub period: PeriodKey,
}

impl ClaimKey {
    /// Builds the key for an achievement as of `today`.
    #[must_use]
    pub fn for_definition(user: &str, def: &AchievementDefinition, today: NaiveDate) -> Self {
        let period = match def.recurrence {
            Recurrence::Milestone => PeriodKey::Milestone,
            Recurrence::Daily => PeriodKey::Day(today),
        };
        Self {
            user_id: user.to_string(),
            achievement_id: def.id.clone(),
            period,
        }
    }
}

impl fmt::Display for ClaimKey {
    /// Renders the ledger reason string: `ach:<id>` for milestones,
    /// `daily:<id>:<ISO-date>` for dailies.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.period {
            PeriodKey::Milestone => write!(f, "ach:{}", self.achievement_id),
            PeriodKey::Day(date) => write!(f, "daily:{}:{}", self.achievement_id, date),
        }
    }
}

/// Outcome of a granted claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimReceipt {
    /// The claimed achievement.
    pub achievement_id: String,

    /// The credited reward.
    pub amount: u32,

    /// The wallet balance after crediting.
    pub new_balance: i64,
}

/// Orchestrates claim attempts against catalog, activity store, and ledger.
pub struct ClaimCoordinator {
    catalog: Arc<AchievementCatalog>,
    ledger: Arc<RewardLedger>,
    evaluator: EligibilityEvaluator,
    clock: Arc<dyn Clock>,
    day_boundary: DayBoundary,
}

impl ClaimCoordinator {
    /// Wires a coordinator from its collaborators.
    #[must_use]
    pub fn new(
        catalog: Arc<AchievementCatalog>,
        ledger: Arc<RewardLedger>,
        store: Arc<dyn ActivityStore>,
        clock: Arc<dyn Clock>,
        day_boundary: DayBoundary,
    ) -> Self {
        let evaluator =
            EligibilityEvaluator::new(store, Arc::clone(&clock), day_boundary);
        Self {
            catalog,
            ledger,
            evaluator,
            clock,
            day_boundary,
        }
    }

    /// Attempts to claim an achievement for a user.
    ///
    /// On success exactly one transaction has been appended and the receipt
    /// carries the credited amount and new balance. On any error nothing has
    /// been appended.
    ///
    /// # Errors
    ///
    /// See [`ClaimError`]; the variants are checked in the order they are
    /// documented there.
    pub fn claim(&self, user: &str, achievement_id: &str) -> Result<ClaimReceipt, ClaimError> {
        let def = self
            .catalog
            .get(achievement_id)
            .ok_or_else(|| ClaimError::NotFound {
                achievement_id: achievement_id.to_string(),
            })?;

        let now = self.clock.now();
        let key = ClaimKey::for_definition(user, def, self.day_boundary.local_date(now));
        let reason = key.to_string();

        if self
            .ledger
            .claim_exists(user, &reason)
            .map_err(ClaimError::Ledger)?
        {
            return Err(ClaimError::AlreadyClaimed { claim_key: reason });
        }

        if !self.evaluator.evaluate(user, def)? {
            return Err(ClaimError::NotEligible {
                achievement_id: achievement_id.to_string(),
            });
        }

        // The catalog refuses zero-reward definitions at load time, so this
        // firing means a misconfigured deployment.
        if def.reward_amount == 0 {
            warn!(achievement_id, "catalog entry with zero reward amount");
            return Err(ClaimError::NoReward {
                achievement_id: achievement_id.to_string(),
            });
        }

        let timestamp_ns = now.timestamp_nanos_opt().unwrap_or(0) as u64;
        let appended = self
            .ledger
            .append_claim(user, i64::from(def.reward_amount), &reason, timestamp_ns)
            .map_err(|err| match err {
                // A racing claim won between our check and our append.
                LedgerError::DuplicateClaimKey { claim_key } => {
                    ClaimError::AlreadyClaimed { claim_key }
                },
                other => ClaimError::Ledger(other),
            })?;

        self.mirror_progress(user, def);

        debug!(
            user,
            achievement_id,
            amount = def.reward_amount,
            new_balance = appended.resulting_balance,
            "reward granted"
        );

        Ok(ClaimReceipt {
            achievement_id: achievement_id.to_string(),
            amount: def.reward_amount,
            new_balance: appended.resulting_balance,
        })
    }

    /// The calendar date of the current instant under the engine's policy.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.day_boundary.local_date(self.clock.now())
    }

    /// The current instant.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Read access to the evaluator, for status computation.
    #[must_use]
    pub const fn evaluator(&self) -> &EligibilityEvaluator {
        &self.evaluator
    }

    /// Best-effort progress mirror update. The mirror is a cache; failures
    /// are logged and never fail the claim.
    fn mirror_progress(&self, user: &str, def: &AchievementDefinition) {
        if def.recurrence != Recurrence::Milestone {
            return;
        }

        let record = ProgressRecord {
            user_id: user.to_string(),
            achievement_id: def.id.clone(),
            progress: 1.0,
            unlocked: true,
        };
        if let Err(err) = self.ledger.upsert_progress(&record) {
            warn!(
                user,
                achievement_id = def.id,
                error = %err,
                "failed to update progress mirror"
            );
        }
    }
}
