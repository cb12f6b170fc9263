//! Expansion tree model
//!
//! Each inspected feature owns one active drill-down path: `rows[0]` is
//! the filtered effect set of the feature itself and `rows[i + 1]` is the
//! expansion of the element selected in `rows[i]`. Expanding a different
//! element at depth `i` discards everything deeper; clicking the element
//! that already drives the next row collapses back to depth `i`.
//!
//! The model is synchronous. Fetching happens outside (see
//! [`crate::session`]) between [`ExpandedFeature::plan_expand`] and
//! [`ExpandedFeature::apply_child`], so a failed fetch never touches state.

use featscope_common::FeatureId;
use serde::Serialize;
use thiserror::Error;

use crate::client::{ClientError, FeatureSource};
use crate::filter::{fetch_filtered_effects, FilteredEffectSet};

/// Invalid expansion requests
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpansionError {
    #[error("Feature {0} has not been inspected")]
    FeatureNotExpanded(FeatureId),

    #[error("Feature {feature} has {depth} rows, row {row} does not exist")]
    RowOutOfRange {
        feature: FeatureId,
        row: usize,
        depth: usize,
    },

    #[error("Row {row} of feature {feature} has {len} elements, element {element} does not exist")]
    ElementOutOfRange {
        feature: FeatureId,
        row: usize,
        element: usize,
        len: usize,
    },

    /// The clicked position now holds a different feature than the one fetched
    #[error("Element {element} of row {row} of feature {feature} is now {found}, not {expected}")]
    StaleElement {
        feature: FeatureId,
        row: usize,
        element: usize,
        expected: FeatureId,
        found: FeatureId,
    },
}

/// What an expand request resolves to before any fetch happens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandPlan {
    /// Same element clicked again: drop its child row and everything deeper
    Collapse,
    /// New element: fetch effects for `child` and replace everything deeper
    Fetch { child: FeatureId },
}

/// Result of a completed transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExpandOutcome {
    Collapsed { depth: usize },
    Expanded { child: FeatureId, depth: usize },
}

/// A feature under inspection with its active drill-down path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandedFeature {
    pub feature: FeatureId,
    pub description: String,
    rows: Vec<FilteredEffectSet>,
    /// `selections[i]` is the element of `rows[i]` that produced `rows[i + 1]`
    selections: Vec<usize>,
    /// Bumped on every mutation
    revision: u64,
}

impl ExpandedFeature {
    /// Create an expanded feature from its already computed first row
    pub fn new(feature: FeatureId, description: impl Into<String>, first_row: FilteredEffectSet) -> Self {
        Self {
            feature,
            description: description.into(),
            rows: vec![first_row],
            selections: Vec::new(),
            revision: 0,
        }
    }

    /// Fetch and filter the top effects of `feature`, then build the entry
    pub async fn fetch(
        source: &dyn FeatureSource,
        feature: FeatureId,
        description: impl Into<String>,
        cap: usize,
    ) -> Result<Self, ClientError> {
        let first_row = fetch_filtered_effects(source, feature, cap).await?;
        Ok(Self::new(feature, description, first_row))
    }

    pub fn rows(&self) -> &[FilteredEffectSet] {
        &self.rows
    }

    pub fn depth(&self) -> usize {
        self.rows.len()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Element of `rows[row]` currently driving `rows[row + 1]`
    pub fn selection(&self, row: usize) -> Option<usize> {
        self.selections.get(row).copied()
    }

    pub fn selections(&self) -> &[usize] {
        &self.selections
    }

    /// Resolve an expand request against the current path
    pub fn plan_expand(&self, row: usize, element: usize) -> Result<ExpandPlan, ExpansionError> {
        let current = self.rows.get(row).ok_or(ExpansionError::RowOutOfRange {
            feature: self.feature,
            row,
            depth: self.rows.len(),
        })?;

        let child = current
            .feature_at(element)
            .ok_or(ExpansionError::ElementOutOfRange {
                feature: self.feature,
                row,
                element,
                len: current.len(),
            })?;

        if self.selection(row) == Some(element) {
            Ok(ExpandPlan::Collapse)
        } else {
            Ok(ExpandPlan::Fetch { child })
        }
    }

    /// Truncate the path so that `rows[row]` is the last row
    pub fn collapse(&mut self, row: usize) -> Result<ExpandOutcome, ExpansionError> {
        if row >= self.rows.len() {
            return Err(ExpansionError::RowOutOfRange {
                feature: self.feature,
                row,
                depth: self.rows.len(),
            });
        }

        self.rows.truncate(row + 1);
        self.selections.truncate(row);
        self.revision += 1;

        Ok(ExpandOutcome::Collapsed {
            depth: self.rows.len(),
        })
    }

    /// Replace everything after `rows[row]` with `child_row`, the expansion
    /// of `child` at position `element`
    ///
    /// `rows[row][element]` must still be `child`; the path may have changed
    /// while the fetch was in flight.
    pub fn apply_child(
        &mut self,
        row: usize,
        element: usize,
        child: FeatureId,
        child_row: FilteredEffectSet,
    ) -> Result<ExpandOutcome, ExpansionError> {
        let current = self.rows.get(row).ok_or(ExpansionError::RowOutOfRange {
            feature: self.feature,
            row,
            depth: self.rows.len(),
        })?;
        let found = current
            .feature_at(element)
            .ok_or(ExpansionError::ElementOutOfRange {
                feature: self.feature,
                row,
                element,
                len: current.len(),
            })?;
        if found != child {
            return Err(ExpansionError::StaleElement {
                feature: self.feature,
                row,
                element,
                expected: child,
                found,
            });
        }

        self.rows.truncate(row + 1);
        self.rows.push(child_row);
        self.selections.truncate(row);
        self.selections.push(element);
        self.revision += 1;

        Ok(ExpandOutcome::Expanded {
            child,
            depth: self.rows.len(),
        })
    }
}

/// Inspected features, most recently inspected first, unique by feature
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExpandedFeatureRegistry {
    entries: Vec<ExpandedFeature>,
}

impl ExpandedFeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry` at the front, dropping any previous entry for the same feature
    pub fn promote(&mut self, entry: ExpandedFeature) {
        self.entries.retain(|e| e.feature != entry.feature);
        self.entries.insert(0, entry);
    }

    pub fn get(&self, feature: FeatureId) -> Option<&ExpandedFeature> {
        self.entries.iter().find(|e| e.feature == feature)
    }

    pub fn get_mut(&mut self, feature: FeatureId) -> Option<&mut ExpandedFeature> {
        self.entries.iter_mut().find(|e| e.feature == feature)
    }

    /// Look up an entry or report it as never inspected
    pub fn require_mut(&mut self, feature: FeatureId) -> Result<&mut ExpandedFeature, ExpansionError> {
        self.get_mut(feature)
            .ok_or(ExpansionError::FeatureNotExpanded(feature))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExpandedFeature> {
        self.entries.iter()
    }

    /// Feature ids in registry order
    pub fn features(&self) -> Vec<FeatureId> {
        self.entries.iter().map(|e| e.feature).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
