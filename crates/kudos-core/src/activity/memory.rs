//! In-process activity store.
//!
//! Backs tests and single-process embeddings. Records are kept per user and
//! the whole store can be flipped unavailable to exercise outage handling.

// Mutex poisoning indicates a panic in another thread, which is unrecoverable.
#![allow(clippy::missing_panics_doc)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};

use super::{ActivityError, ActivityStore};

#[derive(Debug, Default)]
struct UserActivity {
    diary_days: BTreeSet<NaiveDate>,
    diary_created: Vec<DateTime<Utc>>,
    photos: u64,
    todos_done: BTreeMap<NaiveDate, u64>,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<String, UserActivity>,
    unavailable_reason: Option<String>,
}

/// Thread-safe in-memory [`ActivityStore`].
#[derive(Debug, Default)]
pub struct MemoryActivityStore {
    inner: Mutex<Inner>,
}

impl MemoryActivityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diary entry written for `day`, created at `created_at`.
    pub fn record_diary(&self, user: &str, day: NaiveDate, created_at: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        let activity = inner.users.entry(user.to_string()).or_default();
        activity.diary_days.insert(day);
        activity.diary_created.push(created_at);
    }

    /// Records a photo upload.
    pub fn record_photo(&self, user: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.users.entry(user.to_string()).or_default().photos += 1;
    }

    /// Records a to-do completed on `day`.
    pub fn record_todo_done(&self, user: &str, day: NaiveDate) {
        let mut inner = self.inner.lock().unwrap();
        let activity = inner.users.entry(user.to_string()).or_default();
        *activity.todos_done.entry(day).or_insert(0) += 1;
    }

    /// Makes every query fail with [`ActivityError::Unavailable`].
    pub fn set_unavailable(&self, reason: impl Into<String>) {
        self.inner.lock().unwrap().unavailable_reason = Some(reason.into());
    }

    /// Restores normal operation after [`Self::set_unavailable`].
    pub fn set_available(&self) {
        self.inner.lock().unwrap().unavailable_reason = None;
    }

    fn read<T>(
        &self,
        user: &str,
        f: impl FnOnce(Option<&UserActivity>) -> T,
    ) -> Result<T, ActivityError> {
        let inner = self.inner.lock().unwrap();
        if let Some(reason) = &inner.unavailable_reason {
            return Err(ActivityError::Unavailable {
                reason: reason.clone(),
            });
        }
        Ok(f(inner.users.get(user)))
    }
}

impl ActivityStore for MemoryActivityStore {
    fn diary_count(&self, user: &str) -> Result<u64, ActivityError> {
        self.read(user, |a| {
            a.map_or(0, |a| a.diary_created.len() as u64)
        })
    }

    fn diary_exists_on(&self, user: &str, date: NaiveDate) -> Result<bool, ActivityError> {
        self.read(user, |a| a.is_some_and(|a| a.diary_days.contains(&date)))
    }

    fn diary_created_times(&self, user: &str) -> Result<Vec<DateTime<Utc>>, ActivityError> {
        self.read(user, |a| {
            a.map_or_else(Vec::new, |a| a.diary_created.clone())
        })
    }

    fn photo_count(&self, user: &str) -> Result<u64, ActivityError> {
        self.read(user, |a| a.map_or(0, |a| a.photos))
    }

    fn todos_completed_on(&self, user: &str, date: NaiveDate) -> Result<u64, ActivityError> {
        self.read(user, |a| {
            a.map_or(0, |a| a.todos_done.get(&date).copied().unwrap_or(0))
        })
    }

    fn todo_ever_completed(&self, user: &str) -> Result<bool, ActivityError> {
        self.read(user, |a| {
            a.is_some_and(|a| a.todos_done.values().any(|&count| count > 0))
        })
    }
}

#[cfg(test)]
mod unit_tests {
    use chrono::TimeZone;

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_empty_store_answers_zero() {
        let store = MemoryActivityStore::new();

        assert_eq!(store.diary_count("alice").unwrap(), 0);
        assert!(!store.diary_exists_on("alice", day(2025, 8, 15)).unwrap());
        assert!(store.diary_created_times("alice").unwrap().is_empty());
        assert_eq!(store.photo_count("alice").unwrap(), 0);
        assert_eq!(store.todos_completed_on("alice", day(2025, 8, 15)).unwrap(), 0);
        assert!(!store.todo_ever_completed("alice").unwrap());
    }

    #[test]
    fn test_recording_is_per_user() {
        let store = MemoryActivityStore::new();
        let created = Utc.with_ymd_and_hms(2025, 8, 15, 8, 30, 0).unwrap();

        store.record_diary("alice", day(2025, 8, 15), created);
        store.record_photo("alice");
        store.record_todo_done("alice", day(2025, 8, 15));

        assert_eq!(store.diary_count("alice").unwrap(), 1);
        assert_eq!(store.photo_count("alice").unwrap(), 1);
        assert!(store.todo_ever_completed("alice").unwrap());

        assert_eq!(store.diary_count("bob").unwrap(), 0);
        assert_eq!(store.photo_count("bob").unwrap(), 0);
        assert!(!store.todo_ever_completed("bob").unwrap());
    }

    #[test]
    fn test_unavailable_store_fails_every_query() {
        let store = MemoryActivityStore::new();
        store.record_photo("alice");
        store.set_unavailable("maintenance window");

        assert!(matches!(
            store.photo_count("alice"),
            Err(ActivityError::Unavailable { .. })
        ));
        assert!(matches!(
            store.diary_count("alice"),
            Err(ActivityError::Unavailable { .. })
        ));

        store.set_available();
        assert_eq!(store.photo_count("alice").unwrap(), 1);
    }
}
