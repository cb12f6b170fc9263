//! Effect filter
//!
//! Turns a raw effect sample into the trimmed, description-annotated row
//! that the expansion model stores and the UI renders.

use featscope_common::types::EffectSample;
use featscope_common::FeatureId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::client::{ClientError, FeatureSource};

/// Default acceptance bound; see [`select_effects`] for why 11 entries survive
pub const EFFECT_CAP: usize = 10;

/// One row of the drill-down: parallel vectors in scan order
///
/// `indices.len() == values.len() == descriptions.len()`, every value is
/// non-zero, and values are stored exactly as received.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilteredEffectSet {
    pub indices: Vec<FeatureId>,
    pub values: Vec<f64>,
    pub descriptions: Vec<String>,
}

impl FilteredEffectSet {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Feature id of the element at `position`
    pub fn feature_at(&self, position: usize) -> Option<FeatureId> {
        self.indices.get(position).copied()
    }

    /// Description of the element at `position` (empty if unknown)
    pub fn description_at(&self, position: usize) -> Option<&str> {
        self.descriptions.get(position).map(String::as_str)
    }
}

/// Scan a sample in order, skipping zero values, accepting while
/// `accepted.len() <= cap`.
///
/// The bound is checked before each push, so `cap + 1` entries can be
/// accepted (11 for the default cap of 10).
pub fn select_effects(sample: &EffectSample, cap: usize) -> Vec<(FeatureId, f64)> {
    let mut accepted = Vec::with_capacity(sample.len().min(cap.saturating_add(1)));

    for (&index, &value) in sample.indices.iter().zip(&sample.values) {
        if accepted.len() > cap {
            break;
        }
        if value == 0.0 {
            continue;
        }
        accepted.push((index, value));
    }

    accepted
}

/// Attach descriptions to accepted entries, keeping the accepted order
pub fn annotate(
    accepted: &[(FeatureId, f64)],
    descriptions: &HashMap<FeatureId, String>,
) -> FilteredEffectSet {
    let mut set = FilteredEffectSet {
        indices: Vec::with_capacity(accepted.len()),
        values: Vec::with_capacity(accepted.len()),
        descriptions: Vec::with_capacity(accepted.len()),
    };

    for &(index, value) in accepted {
        set.indices.push(index);
        set.values.push(value);
        set.descriptions
            .push(descriptions.get(&index).cloned().unwrap_or_default());
    }

    set
}

/// Filter a sample and fetch descriptions for the survivors
///
/// A failed description batch degrades to empty descriptions.
pub async fn filter_effects(
    source: &dyn FeatureSource,
    sample: &EffectSample,
    cap: usize,
) -> FilteredEffectSet {
    let accepted = select_effects(sample, cap);
    if accepted.is_empty() {
        return FilteredEffectSet::default();
    }

    let keys: Vec<FeatureId> = accepted.iter().map(|(index, _)| *index).collect();
    let descriptions = match source.descriptions(&keys).await {
        Ok(map) => map,
        Err(e) => {
            warn!(error = %e, "Description batch failed, rendering without text");
            HashMap::new()
        }
    };

    annotate(&accepted, &descriptions)
}

/// Fetch the top effects of `feature` and filter them into a row
///
/// A failed effects query is an error, distinct from a valid empty row.
pub async fn fetch_filtered_effects(
    source: &dyn FeatureSource,
    feature: FeatureId,
    cap: usize,
) -> Result<FilteredEffectSet, ClientError> {
    let sample = source.top_effects(feature).await?;
    let set = filter_effects(source, &sample, cap).await;
    debug!(feature, raw = sample.len(), kept = set.len(), "Filtered top effects");
    Ok(set)
}
