// Generation service configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Configuration for the HTTP generation client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Base API endpoint URL.
    pub api_url: String,
    /// API key or token, when the provider requires one.
    pub api_key: Option<String>,
    /// Default model for image generation; node payloads may override.
    pub image_model: String,
    /// Default model for text transforms and analysis.
    pub text_model: String,
    /// Default model for video generation.
    pub video_model: String,
    /// Seconds between polls of a long-running video operation.
    pub poll_interval_secs: u64,
    /// Upper bound on video polls before the operation is abandoned.
    pub max_polls: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8787".into(),
            api_key: None,
            image_model: "image-standard-1".into(),
            text_model: "text-standard-1".into(),
            video_model: "video-standard-1".into(),
            poll_interval_secs: 10,
            max_polls: 90,
        }
    }
}

impl ServiceConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    pub fn with_text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    pub fn with_video_model(mut self, model: impl Into<String>) -> Self {
        self.video_model = model.into();
        self
    }

    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    pub fn with_max_polls(mut self, max: u32) -> Self {
        self.max_polls = max;
        self
    }

    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| EngineError::RequestFailed(format!("Failed to write config: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| EngineError::RequestFailed(format!("Failed to read config: {}", e)))?;
        Ok(serde_json::from_str(&json)?)
    }
}
