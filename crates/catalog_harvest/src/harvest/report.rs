//! Per-stage bookkeeping of parsed and skipped work items.

use super::error::HarvestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// The four pipeline stages, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Faculties,
    Subjects,
    Courses,
    Schedules,
}

impl Stage {
    /// Name of the record set this stage writes.
    pub fn snapshot_name(self) -> &'static str {
        match self {
            Stage::Faculties => "faculties",
            Stage::Subjects => "subjects",
            Stage::Courses => "courses",
            Stage::Schedules => "class_schedules",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Faculties => "faculties",
            Stage::Subjects => "subjects",
            Stage::Courses => "courses",
            Stage::Schedules => "schedules",
        };
        f.write_str(name)
    }
}

impl FromStr for Stage {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "faculties" => Ok(Stage::Faculties),
            "subjects" => Ok(Stage::Subjects),
            "courses" => Ok(Stage::Courses),
            "schedules" | "class_schedules" => Ok(Stage::Schedules),
            other => Err(HarvestError::Config {
                message: format!("unknown stage {:?}", other),
            }),
        }
    }
}

/// Result of processing one list item, row, or page within a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome<T> {
    Parsed(T),
    Skipped(SkippedItem),
}

impl<T> ItemOutcome<T> {
    pub fn skipped(item: impl Into<String>, reason: impl Into<String>) -> Self {
        ItemOutcome::Skipped(SkippedItem {
            item: item.into(),
            reason: reason.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    /// What was being processed (label, URL, or row description)
    pub item: String,
    pub reason: String,
}

/// Counts of what a stage produced and what it had to skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub records: usize,
    pub skipped: Vec<SkippedItem>,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            records: 0,
            skipped: Vec::new(),
        }
    }

    /// Logs and stores a skip, passing parsed values through.
    pub fn absorb<T>(&mut self, outcome: ItemOutcome<T>) -> Option<T> {
        match outcome {
            ItemOutcome::Parsed(value) => Some(value),
            ItemOutcome::Skipped(skip) => {
                self.skip(skip);
                None
            }
        }
    }

    pub fn skip(&mut self, skip: SkippedItem) {
        warn!(stage = %self.stage, item = %skip.item, reason = %skip.reason, "Skipping item");
        self.skipped.push(skip);
    }

    /// Fails when more items were skipped than `limit` allows.
    pub fn enforce_limit(&self, limit: Option<usize>) -> Result<(), HarvestError> {
        match limit {
            Some(limit) if self.skipped.len() > limit => Err(HarvestError::SkipLimitExceeded {
                stage: self.stage.to_string(),
                skipped: self.skipped.len(),
                limit,
            }),
            _ => Ok(()),
        }
    }
}
