//! Fixture documents for seeding a store.

use crate::entity::Mark;
use crate::error::StorageError;
use crate::store::{MasteryRecord, PageRecord, RecordSink, UserRecord};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// JSON document of rows to load into a store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub pages: Vec<PageRecord>,
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub masteries: Vec<MasteryRecord>,
    #[serde(default)]
    pub marks: Vec<Mark>,
}

/// Row counts written by `Fixture::apply`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FixtureSummary {
    pub pages: usize,
    pub users: usize,
    pub masteries: usize,
    pub marks: usize,
}

impl Fixture {
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        serde_json::from_str(json).map_err(|e| StorageError::Codec {
            kind: "fixture",
            message: e.to_string(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, StorageError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write every row to `sink`, overwriting rows with the same key.
    pub fn apply(&self, sink: &dyn RecordSink) -> Result<FixtureSummary, StorageError> {
        for page in &self.pages {
            sink.put_page(page)?;
        }
        for user in &self.users {
            sink.put_user(user)?;
        }
        for mastery in &self.masteries {
            sink.put_mastery(mastery)?;
        }
        for mark in &self.marks {
            sink.put_mark(mark)?;
        }
        let summary = FixtureSummary {
            pages: self.pages.len(),
            users: self.users.len(),
            masteries: self.masteries.len(),
            marks: self.marks.len(),
        };
        info!(
            pages = summary.pages,
            users = summary.users,
            masteries = summary.masteries,
            marks = summary.marks,
            "fixture applied"
        );
        Ok(summary)
    }
}
