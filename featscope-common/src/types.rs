//! Wire types of the Feature Data Service
//!
//! These mirror the JSON payloads exchanged with the external service and
//! are shared by the explorer client and by test doubles of the service.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Error, Result};

/// Identifier of one model feature (latent dimension)
pub type FeatureId = u32;

/// Raw output of a similarity or top-effects query
///
/// Parallel arrays of equal length, unordered with respect to magnitude.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EffectSample {
    pub indices: Vec<FeatureId>,
    pub values: Vec<f64>,
}

impl EffectSample {
    pub fn new(indices: Vec<FeatureId>, values: Vec<f64>) -> Self {
        Self { indices, values }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Effect payload as received, before shape validation
///
/// The service has been seen to answer with `null` or with a body that
/// lacks one of the arrays, so both fields are optional here.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawEffectSample {
    #[serde(default)]
    pub indices: Option<Vec<FeatureId>>,
    #[serde(default)]
    pub values: Option<Vec<f64>>,
}

impl RawEffectSample {
    /// Validate the payload shape
    ///
    /// Both arrays must be present and of equal length. Empty arrays are a
    /// valid (if uninteresting) answer.
    pub fn validate(self) -> Result<EffectSample> {
        let indices = self
            .indices
            .ok_or_else(|| Error::InvalidInput("effect payload has no indices".to_string()))?;
        let values = self
            .values
            .ok_or_else(|| Error::InvalidInput("effect payload has no values".to_string()))?;

        if indices.len() != values.len() {
            return Err(Error::InvalidInput(format!(
                "effect payload length mismatch: {} indices, {} values",
                indices.len(),
                values.len()
            )));
        }

        Ok(EffectSample { indices, values })
    }
}

/// Body of `POST /get_description`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionRequest {
    pub keys: Vec<FeatureId>,
}

/// Response of `POST /get_description`
///
/// JSON object keys are the decimal feature ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescriptionResponse {
    #[serde(default)]
    pub descriptions: HashMap<FeatureId, String>,
}

/// One search result, serialized as `[description, feature]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit(pub String, pub FeatureId);

impl SearchHit {
    pub fn description(&self) -> &str {
        &self.0
    }

    pub fn feature(&self) -> FeatureId {
        self.1
    }
}
