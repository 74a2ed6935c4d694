//! Read-only activity facts consumed by eligibility evaluation.
//!
//! The engine never writes activity data; it only asks questions of an
//! [`ActivityStore`] owned by the surrounding product (diary, photo, and
//! to-do services). Every query is fallible so a store outage surfaces as a
//! transient error instead of a silently wrong answer; a claim must never
//! proceed on unconfirmed eligibility.

mod memory;

pub use memory::MemoryActivityStore;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

/// Errors from activity queries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ActivityError {
    /// The store cannot be reached right now. Retryable.
    #[error("activity store unavailable: {reason}")]
    Unavailable {
        /// Human-readable cause.
        reason: String,
    },

    /// The store answered but the query itself failed.
    #[error("activity query failed: {0}")]
    Query(String),
}

/// Date-indexed activity facts for a user.
///
/// All methods are side-effect-free and may be called concurrently with each
/// other and with in-flight claims.
pub trait ActivityStore: Send + Sync {
    /// Total diary entries the user has written.
    fn diary_count(&self, user: &str) -> Result<u64, ActivityError>;

    /// Whether a diary entry exists for the given calendar date.
    fn diary_exists_on(&self, user: &str, date: NaiveDate) -> Result<bool, ActivityError>;

    /// Creation instants of every diary entry, for time-of-day checks.
    fn diary_created_times(&self, user: &str) -> Result<Vec<DateTime<Utc>>, ActivityError>;

    /// Total photos the user has uploaded.
    fn photo_count(&self, user: &str) -> Result<u64, ActivityError>;

    /// Number of to-dos completed on the given calendar date.
    fn todos_completed_on(&self, user: &str, date: NaiveDate) -> Result<u64, ActivityError>;

    /// Whether the user has ever completed a to-do.
    fn todo_ever_completed(&self, user: &str) -> Result<bool, ActivityError>;
}
