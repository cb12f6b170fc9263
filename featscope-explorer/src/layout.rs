//! Render layouts for an expanded feature
//!
//! Two presentations of the same drill-down path:
//! - bars: each row is a strip of bars whose widths are proportional shares
//! - sankey: a column per row whose element heights share a fixed height,
//!   preceded by a full-height element for the inspected feature itself
//!
//! Normalization happens here and only here; stored rows keep raw values.

use featscope_common::FeatureId;
use serde::{Deserialize, Serialize};

use crate::expansion::ExpandedFeature;
use crate::filter::FilteredEffectSet;
use crate::linker::normalize_values;

/// Total height of a sankey column in pixels
pub const SANKEY_HEIGHT: f64 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    #[default]
    Bars,
    Sankey,
}

/// One clickable element of a rendered row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutElement {
    pub feature: FeatureId,
    pub description: String,
    /// Raw effect value as stored
    pub value: f64,
    /// Percentage of row width (bars) or pixel height (sankey)
    pub size: f64,
    /// This element drives the next row
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutRow {
    pub index: usize,
    pub elements: Vec<LayoutElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureLayout {
    pub mode: LayoutMode,
    pub feature: FeatureId,
    pub description: String,
    /// Full-height element for the inspected feature (sankey only)
    pub root: Option<LayoutElement>,
    pub rows: Vec<LayoutRow>,
}

fn layout_row(index: usize, row: &FilteredEffectSet, scale: f64, selected: Option<usize>) -> LayoutRow {
    let shares = normalize_values(&row.values);

    let elements = shares
        .iter()
        .enumerate()
        .map(|(i, share)| LayoutElement {
            feature: row.indices[i],
            description: row.descriptions[i].clone(),
            value: row.values[i],
            size: share * scale,
            selected: selected == Some(i),
        })
        .collect();

    LayoutRow { index, elements }
}

/// Lay out every row of `expanded` for the given mode
pub fn layout_feature(expanded: &ExpandedFeature, mode: LayoutMode) -> FeatureLayout {
    let scale = match mode {
        LayoutMode::Bars => 100.0,
        LayoutMode::Sankey => SANKEY_HEIGHT,
    };

    let rows = expanded
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| layout_row(i, row, scale, expanded.selection(i)))
        .collect();

    let root = match mode {
        LayoutMode::Bars => None,
        LayoutMode::Sankey => Some(LayoutElement {
            feature: expanded.feature,
            description: expanded.description.clone(),
            value: 1.0,
            size: SANKEY_HEIGHT,
            selected: false,
        }),
    };

    FeatureLayout {
        mode,
        feature: expanded.feature,
        description: expanded.description.clone(),
        root,
        rows,
    }
}
