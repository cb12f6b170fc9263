//! Third-party embed viewer addressing

use featscope_common::config::ViewerConfig;
use featscope_common::FeatureId;

/// Builds iframe URLs of the form `https://<host>/<model>/<layer>/<feature>?embed=true`
#[derive(Debug, Clone)]
pub struct EmbedViewer {
    host: String,
    model: String,
    layer: String,
}

impl EmbedViewer {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            host: config.host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            layer: config.layer.clone(),
        }
    }

    pub fn url(&self, feature: FeatureId) -> String {
        format!(
            "https://{}/{}/{}/{}?embed=true",
            self.host, self.model, self.layer, feature
        )
    }
}
