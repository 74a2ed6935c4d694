//! Eligibility evaluation.
//!
//! Decides whether an achievement's condition currently holds for a user by
//! querying the activity store. Evaluation is side-effect-free and recomputed
//! on demand; whether a reward was already granted is a separate question
//! answered by the ledger.
//!
//! All date and time-of-day derivations go through the engine's single
//! [`DayBoundary`] so streak length and daily checks share one calendar.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::activity::{ActivityError, ActivityStore};
use crate::catalog::{
    AchievementDefinition, ActivityMetric, Condition, TimeOfDayBound,
};
use crate::clock::{Clock, DayBoundary};

/// Evaluates achievement conditions against activity facts.
pub struct EligibilityEvaluator {
    store: Arc<dyn ActivityStore>,
    clock: Arc<dyn Clock>,
    day_boundary: DayBoundary,
}

impl EligibilityEvaluator {
    /// Creates an evaluator over the given store and calendar policy.
    #[must_use]
    pub fn new(
        store: Arc<dyn ActivityStore>,
        clock: Arc<dyn Clock>,
        day_boundary: DayBoundary,
    ) -> Self {
        Self {
            store,
            clock,
            day_boundary,
        }
    }

    /// Returns whether the definition's condition currently holds for `user`.
    ///
    /// # Errors
    ///
    /// Returns an error if the activity store cannot be queried; callers must
    /// treat that as "eligibility unknown", never as `false`.
    pub fn evaluate(
        &self,
        user: &str,
        def: &AchievementDefinition,
    ) -> Result<bool, ActivityError> {
        let today = self.day_boundary.local_date(self.clock.now());

        match &def.condition {
            Condition::CountAtLeast { metric, threshold } => {
                let count = self.metric_count(user, *metric, today)?;
                Ok(count >= u64::from(*threshold))
            },
            Condition::ConsecutiveDiaryDaysAtLeast { days } => {
                let streak = self.consecutive_diary_days(user, today, *days)?;
                Ok(streak >= *days)
            },
            Condition::DiaryExistsToday => self.store.diary_exists_on(user, today),
            Condition::DiaryTimeOfDayCountAtLeast { bound, threshold } => {
                let count = self.time_of_day_count(user, *bound)?;
                Ok(count >= u64::from(*threshold))
            },
        }
    }

    /// Consecutive days with a diary entry, counting backward from `today`
    /// and stopping at the first day without one. Capped at `cap`, which is
    /// sufficient for any `>= cap` comparison.
    pub fn consecutive_diary_days(
        &self,
        user: &str,
        today: NaiveDate,
        cap: u32,
    ) -> Result<u32, ActivityError> {
        let mut streak = 0;
        let mut day = today;

        while streak < cap && self.store.diary_exists_on(user, day)? {
            streak += 1;
            match day.pred_opt() {
                Some(prev) => day = prev,
                None => break,
            }
        }

        Ok(streak)
    }

    fn metric_count(
        &self,
        user: &str,
        metric: ActivityMetric,
        today: NaiveDate,
    ) -> Result<u64, ActivityError> {
        match metric {
            ActivityMetric::DiaryEntries => self.store.diary_count(user),
            ActivityMetric::PhotosUploaded => self.store.photo_count(user),
            ActivityMetric::TodosCompletedToday => self.store.todos_completed_on(user, today),
            ActivityMetric::TodosEverCompleted => {
                Ok(u64::from(self.store.todo_ever_completed(user)?))
            },
        }
    }

    fn time_of_day_count(
        &self,
        user: &str,
        bound: TimeOfDayBound,
    ) -> Result<u64, ActivityError> {
        let times = self.store.diary_created_times(user)?;

        let count = times
            .into_iter()
            .map(|instant| self.day_boundary.local_time(instant))
            .filter(|local| match bound {
                TimeOfDayBound::Before(cutoff) => *local < cutoff,
                TimeOfDayBound::AtOrAfter(start) => *local >= start,
            })
            .count();

        Ok(count as u64)
    }
}
