//! Similarity graph
//!
//! Accumulates similarity lookups into a node/link graph suitable for a
//! sankey diagram. Each lookup adds the queried feature and all returned
//! features as nodes, and links the first returned feature to every other
//! returned feature. Repeated links keep their strongest value.

use featscope_common::types::EffectSample;
use featscope_common::FeatureId;
use serde::Serialize;
use thiserror::Error;

/// Links never carry less than this, so a sankey layout can size them
pub const MIN_LINK_VALUE: f64 = 0.00001;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Similarity sample for feature {0} has no entries")]
pub struct EmptySampleError(pub FeatureId);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: FeatureId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphLink {
    pub source: FeatureId,
    pub target: FeatureId,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimilarityGraph {
    nodes: Vec<GraphNode>,
    links: Vec<GraphLink>,
}

impl SimilarityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn links(&self) -> &[GraphLink] {
        &self.links
    }

    fn add_node(&mut self, id: FeatureId) {
        if !self.nodes.iter().any(|n| n.id == id) {
            self.nodes.push(GraphNode {
                id,
                name: format!("Feature {}", id),
            });
        }
    }

    fn add_link(&mut self, source: FeatureId, target: FeatureId, value: f64) {
        let value = value.max(MIN_LINK_VALUE);
        match self
            .links
            .iter_mut()
            .find(|l| l.source == source && l.target == target)
        {
            Some(existing) => existing.value = existing.value.max(value),
            None => self.links.push(GraphLink {
                source,
                target,
                value,
            }),
        }
    }

    /// Merge one similarity lookup for `queried`
    ///
    /// An empty sample is rejected and leaves the graph unchanged.
    pub fn merge(&mut self, queried: FeatureId, sample: &EffectSample) -> Result<(), EmptySampleError> {
        if sample.indices.is_empty() || sample.values.is_empty() {
            return Err(EmptySampleError(queried));
        }

        self.add_node(queried);
        for &index in &sample.indices {
            self.add_node(index);
        }

        let source = sample.indices[0];
        for (&target, &value) in sample.indices.iter().zip(&sample.values).skip(1) {
            self.add_link(source, target, value);
        }

        Ok(())
    }
}
