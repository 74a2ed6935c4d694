//! Immutable achievement catalog.
//!
//! The catalog is a frozen id → definition registry constructed once at
//! startup, either from the built-in seed set or from a TOML file. Changing
//! definitions is a deployment-time action; there is no runtime mutation
//! path.
//!
//! Each definition carries its earning condition as a [`Condition`] variant
//! from a closed set, so adding an achievement is a compile-time-checked
//! data-plus-code change and an id without a condition cannot exist.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from catalog construction and loading.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    /// Two definitions share an id.
    #[error("duplicate achievement id: {id}")]
    DuplicateId {
        /// The offending id.
        id: String,
    },

    /// A definition has an empty id.
    #[error("achievement definition with empty id")]
    EmptyId,

    /// A definition grants nothing; such entries are misconfigurations.
    #[error("achievement {id} has a zero reward amount")]
    ZeroReward {
        /// The offending id.
        id: String,
    },

    /// I/O error reading a catalog file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid TOML in a catalog file.
    #[error("catalog parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// How often a reward can be earned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    /// Claimable at most once per user for the account's lifetime.
    Milestone,
    /// Claimable at most once per user per calendar day.
    Daily,
}

/// Activity totals a counting condition can be measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityMetric {
    /// Total diary entries ever written.
    DiaryEntries,
    /// Total photos ever uploaded.
    PhotosUploaded,
    /// To-dos completed on the current calendar day.
    TodosCompletedToday,
    /// Whether any to-do was ever completed (counts as 0 or 1).
    TodosEverCompleted,
}

/// Which side of a time-of-day threshold qualifies an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "edge", content = "time", rename_all = "snake_case")]
pub enum TimeOfDayBound {
    /// Entries created strictly before the given local time.
    Before(NaiveTime),
    /// Entries created at or after the given local time.
    AtOrAfter(NaiveTime),
}

/// The closed set of earning conditions.
///
/// Evaluation semantics live in the eligibility module; the catalog only
/// declares which condition applies to which achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// An activity total reached a threshold.
    CountAtLeast {
        /// The total being measured.
        metric: ActivityMetric,
        /// Minimum value for eligibility.
        threshold: u32,
    },

    /// A diary entry exists on each of the last `days` calendar days,
    /// counting backward from today and stopping at the first gap.
    ConsecutiveDiaryDaysAtLeast {
        /// Required streak length, including today.
        days: u32,
    },

    /// A diary entry exists on the current calendar day.
    DiaryExistsToday,

    /// Enough diary entries were created on a given side of a local
    /// time-of-day threshold.
    DiaryTimeOfDayCountAtLeast {
        /// The qualifying side of the threshold.
        bound: TimeOfDayBound,
        /// Minimum qualifying entries for eligibility.
        threshold: u32,
    },
}

/// A single achievement definition. Immutable once the catalog is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementDefinition {
    /// Stable string key, e.g. `first_diary`.
    pub id: String,

    /// Display title.
    pub title: String,

    /// Display description.
    pub description: String,

    /// Reward credited on claim. Always positive in a valid catalog.
    pub reward_amount: u32,

    /// Milestone or daily recurrence.
    pub recurrence: Recurrence,

    /// Earning condition.
    pub condition: Condition,
}

/// TOML file shape: a list of `[[achievement]]` tables.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    achievement: Vec<AchievementDefinition>,
}

/// Frozen id → definition registry.
#[derive(Debug, Clone)]
pub struct AchievementCatalog {
    definitions: Vec<AchievementDefinition>,
    by_id: HashMap<String, usize>,
}

impl AchievementCatalog {
    /// Builds a catalog from a list of definitions, validating fail-closed.
    ///
    /// # Errors
    ///
    /// Returns an error on empty ids, duplicate ids, or zero reward amounts.
    pub fn new(definitions: Vec<AchievementDefinition>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(definitions.len());

        for (index, def) in definitions.iter().enumerate() {
            if def.id.is_empty() {
                return Err(CatalogError::EmptyId);
            }
            if def.reward_amount == 0 {
                return Err(CatalogError::ZeroReward { id: def.id.clone() });
            }
            if by_id.insert(def.id.clone(), index).is_some() {
                return Err(CatalogError::DuplicateId { id: def.id.clone() });
            }
        }

        Ok(Self { definitions, by_id })
    }

    /// The built-in seed set shipped with the product.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(builtin_definitions()).expect("built-in definitions are valid")
    }

    /// Parses a catalog from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(content)?;
        Self::new(file.achievement)
    }

    /// Loads a catalog from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Looks up a definition by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AchievementDefinition> {
        self.by_id.get(id).map(|&index| &self.definitions[index])
    }

    /// All definitions, in seed order.
    #[must_use]
    pub fn list(&self) -> &[AchievementDefinition] {
        &self.definitions
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` if the catalog holds no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn builtin_definitions() -> Vec<AchievementDefinition> {
    fn hms(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time of day")
    }

    fn def(
        id: &str,
        title: &str,
        description: &str,
        reward_amount: u32,
        recurrence: Recurrence,
        condition: Condition,
    ) -> AchievementDefinition {
        AchievementDefinition {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            reward_amount,
            recurrence,
            condition,
        }
    }

    vec![
        def(
            "first_diary",
            "First Entry",
            "Write your first diary entry",
            10,
            Recurrence::Milestone,
            Condition::CountAtLeast {
                metric: ActivityMetric::DiaryEntries,
                threshold: 1,
            },
        ),
        def(
            "third_diary",
            "Three Entries",
            "Write three diary entries in total",
            20,
            Recurrence::Milestone,
            Condition::CountAtLeast {
                metric: ActivityMetric::DiaryEntries,
                threshold: 3,
            },
        ),
        def(
            "photo_first",
            "First Photo",
            "Upload your first photo",
            5,
            Recurrence::Milestone,
            Condition::CountAtLeast {
                metric: ActivityMetric::PhotosUploaded,
                threshold: 1,
            },
        ),
        def(
            "todo_first_done",
            "First Task Done",
            "Complete your first to-do",
            5,
            Recurrence::Milestone,
            Condition::CountAtLeast {
                metric: ActivityMetric::TodosEverCompleted,
                threshold: 1,
            },
        ),
        def(
            "streak_7",
            "Seven-Day Streak",
            "Write a diary entry seven days in a row",
            30,
            Recurrence::Milestone,
            Condition::ConsecutiveDiaryDaysAtLeast { days: 7 },
        ),
        def(
            "early_bird_3",
            "Early Bird x3",
            "Write three diary entries before 09:00",
            10,
            Recurrence::Milestone,
            Condition::DiaryTimeOfDayCountAtLeast {
                bound: TimeOfDayBound::Before(hms(9, 0)),
                threshold: 3,
            },
        ),
        def(
            "night_owl_3",
            "Night Owl x3",
            "Write three diary entries at or after 22:00",
            10,
            Recurrence::Milestone,
            Condition::DiaryTimeOfDayCountAtLeast {
                bound: TimeOfDayBound::AtOrAfter(hms(22, 0)),
                threshold: 3,
            },
        ),
        def(
            "daily_diary",
            "Daily Entry",
            "Write a diary entry today",
            3,
            Recurrence::Daily,
            Condition::DiaryExistsToday,
        ),
        def(
            "daily_todo3",
            "Three Tasks Today",
            "Complete three to-dos today",
            5,
            Recurrence::Daily,
            Condition::CountAtLeast {
                metric: ActivityMetric::TodosCompletedToday,
                threshold: 3,
            },
        ),
    ]
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_shape() {
        let catalog = AchievementCatalog::builtin();

        assert_eq!(catalog.len(), 9);
        assert!(!catalog.is_empty());

        let first = catalog.get("first_diary").expect("first_diary is seeded");
        assert_eq!(first.reward_amount, 10);
        assert_eq!(first.recurrence, Recurrence::Milestone);

        let daily = catalog.get("daily_diary").expect("daily_diary is seeded");
        assert_eq!(daily.reward_amount, 3);
        assert_eq!(daily.recurrence, Recurrence::Daily);

        assert!(catalog.get("no_such_achievement").is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut defs = builtin_definitions();
        defs.push(defs[0].clone());

        let err = AchievementCatalog::new(defs).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId { id } if id == "first_diary"));
    }

    #[test]
    fn test_zero_reward_rejected() {
        let mut defs = builtin_definitions();
        defs[0].reward_amount = 0;

        let err = AchievementCatalog::new(defs).unwrap_err();
        assert!(matches!(err, CatalogError::ZeroReward { .. }));
    }

    #[test]
    fn test_empty_id_rejected() {
        let mut defs = builtin_definitions();
        defs[0].id = String::new();

        let err = AchievementCatalog::new(defs).unwrap_err();
        assert!(matches!(err, CatalogError::EmptyId));
    }

    #[test]
    fn test_catalog_from_toml() {
        let toml = r#"
            [[achievement]]
            id = "first_diary"
            title = "First Entry"
            description = "Write your first diary entry"
            reward_amount = 10
            recurrence = "milestone"
            condition = { kind = "count_at_least", metric = "diary_entries", threshold = 1 }

            [[achievement]]
            id = "daily_diary"
            title = "Daily Entry"
            description = "Write a diary entry today"
            reward_amount = 3
            recurrence = "daily"
            condition = { kind = "diary_exists_today" }
        "#;

        let catalog = AchievementCatalog::from_toml(toml).expect("valid catalog");
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.get("first_diary").unwrap().condition,
            Condition::CountAtLeast {
                metric: ActivityMetric::DiaryEntries,
                threshold: 1,
            }
        );
    }

    #[test]
    fn test_catalog_from_toml_rejects_unknown_condition_kind() {
        let toml = r#"
            [[achievement]]
            id = "mystery"
            title = "Mystery"
            description = "Unmapped condition"
            reward_amount = 1
            recurrence = "milestone"
            condition = { kind = "phase_of_moon" }
        "#;

        assert!(matches!(
            AchievementCatalog::from_toml(toml),
            Err(CatalogError::Parse(_))
        ));
    }
}
