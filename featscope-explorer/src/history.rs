//! Visit history
//!
//! Append-on-visit, one entry per feature. Revisiting a feature removes its
//! old entry and appends a new one, so the newest visit is always last.

use featscope_common::FeatureId;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub feature: FeatureId,
    pub description: String,
    pub visited_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a visit (filter-then-append)
    pub fn visit(&mut self, feature: FeatureId, description: impl Into<String>) {
        self.entries.retain(|e| e.feature != feature);
        self.entries.push(HistoryEntry {
            feature,
            description: description.into(),
            visited_at: chrono::Utc::now(),
        });
    }

    /// Oldest first
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Newest first, the order the history strip is drawn in
    pub fn newest_first(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
