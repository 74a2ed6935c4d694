//! Achievement progress mirror.
//!
//! A display cache derived from the journal and the catalog. It is never
//! authoritative: losing it loses nothing, and [`ProgressMirror::rebuild`]
//! restores every row from durable state.

use chrono::NaiveDate;

use crate::catalog::{AchievementCatalog, Recurrence};
use crate::claim::ClaimKey;
use crate::ledger::{LedgerError, ProgressRecord, RewardLedger};

/// Rebuilds and reads the progress cache.
pub struct ProgressMirror<'a> {
    ledger: &'a RewardLedger,
    catalog: &'a AchievementCatalog,
}

impl<'a> ProgressMirror<'a> {
    /// Creates a mirror over the given ledger and catalog.
    #[must_use]
    pub const fn new(ledger: &'a RewardLedger, catalog: &'a AchievementCatalog) -> Self {
        Self { ledger, catalog }
    }

    /// Reads the cached rows for a user, in achievement-id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn snapshot(&self, user: &str) -> Result<Vec<ProgressRecord>, LedgerError> {
        self.ledger.progress_for_user(user)
    }

    /// Re-derives every row for a user from the journal and catalog,
    /// replacing whatever the cache held.
    ///
    /// Milestones are unlocked iff their claim key is recorded; dailies show
    /// progress 1 on a day they were claimed and reset with the period.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read or written.
    pub fn rebuild(&self, user: &str, today: NaiveDate) -> Result<Vec<ProgressRecord>, LedgerError> {
        self.ledger.clear_progress(user)?;

        let mut records = Vec::with_capacity(self.catalog.len());
        for def in self.catalog.list() {
            let key = ClaimKey::for_definition(user, def, today);
            let claimed = self.ledger.claim_exists(user, &key.to_string())?;

            let record = ProgressRecord {
                user_id: user.to_string(),
                achievement_id: def.id.clone(),
                progress: if claimed { 1.0 } else { 0.0 },
                unlocked: claimed && def.recurrence == Recurrence::Milestone,
            };
            self.ledger.upsert_progress(&record)?;
            records.push(record);
        }

        records.sort_by(|a, b| a.achievement_id.cmp(&b.achievement_id));
        Ok(records)
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_rebuild_from_empty_journal() {
        let ledger = RewardLedger::in_memory().unwrap();
        let catalog = AchievementCatalog::builtin();
        let mirror = ProgressMirror::new(&ledger, &catalog);

        let records = mirror.rebuild("alice", day(2025, 8, 15)).unwrap();

        assert_eq!(records.len(), catalog.len());
        assert!(records.iter().all(|r| !r.unlocked && r.progress == 0.0));
    }

    #[test]
    fn test_rebuild_restores_claimed_state() {
        let ledger = RewardLedger::in_memory().unwrap();
        let catalog = AchievementCatalog::builtin();

        ledger.append_claim("alice", 10, "ach:first_diary", 1).unwrap();
        ledger
            .append_claim("alice", 3, "daily:daily_diary:2025-08-15", 2)
            .unwrap();

        let mirror = ProgressMirror::new(&ledger, &catalog);
        let records = mirror.rebuild("alice", day(2025, 8, 15)).unwrap();

        let first = records
            .iter()
            .find(|r| r.achievement_id == "first_diary")
            .unwrap();
        assert!(first.unlocked);
        assert!((first.progress - 1.0).abs() < f64::EPSILON);

        let daily = records
            .iter()
            .find(|r| r.achievement_id == "daily_diary")
            .unwrap();
        assert!(!daily.unlocked);
        assert!((daily.progress - 1.0).abs() < f64::EPSILON);

        // The daily row resets on the next calendar day.
        let next_day = mirror.rebuild("alice", day(2025, 8, 16)).unwrap();
        let daily = next_day
            .iter()
            .find(|r| r.achievement_id == "daily_diary")
            .unwrap();
        assert!(daily.progress == 0.0);
    }

    #[test]
    fn test_rebuild_matches_opportunistic_mirror() {
        let ledger = RewardLedger::in_memory().unwrap();
        let catalog = AchievementCatalog::builtin();

        // Simulate the coordinator's best-effort milestone upsert.
        ledger.append_claim("alice", 5, "ach:photo_first", 1).unwrap();
        ledger
            .upsert_progress(&ProgressRecord {
                user_id: "alice".to_string(),
                achievement_id: "photo_first".to_string(),
                progress: 1.0,
                unlocked: true,
            })
            .unwrap();

        let mirror = ProgressMirror::new(&ledger, &catalog);
        let before = ledger.progress("alice", "photo_first").unwrap().unwrap();

        let rebuilt = mirror.rebuild("alice", day(2025, 8, 15)).unwrap();
        let after = rebuilt
            .iter()
            .find(|r| r.achievement_id == "photo_first")
            .unwrap();

        assert_eq!(before, *after);
    }
}
