// Remote generation service client.
//
// The engine only depends on the `GenerationService` trait; this module also
// ships the HTTP implementation used in production. Every operation is a
// single request/response call except video generation, which submits a
// long-running operation and polls it on a fixed interval.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::EngineError;
use crate::models::schema::ImageRef;
use crate::settings::ServiceConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextOp {
    Enhance,
    Sanitize,
    Translate,
}

impl TextOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextOp::Enhance => "enhance",
            TextOp::Sanitize => "sanitize",
            TextOp::Translate => "translate",
        }
    }
}

/// Black-box contract with the AI provider. Errors carry an optional HTTP
/// status so the retry wrapper can recognize transient overload.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generate one image, returned as a data URL.
    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: &str,
        reference_images: &[ImageRef],
        model: &str,
        resolution: Option<&str>,
    ) -> Result<String, EngineError>;

    /// Generate a video via submit-then-poll, returned as a data URL.
    async fn generate_video(
        &self,
        prompt: &str,
        aspect_ratio: &str,
        resolution: &str,
    ) -> Result<String, EngineError>;

    /// Pure text-in/text-out transform.
    async fn transform_text(&self, op: TextOp, input: &str) -> Result<String, EngineError>;

    /// Describe an image as prose.
    async fn describe_image(&self, image: &ImageRef) -> Result<String, EngineError>;

    /// Break a prompt into structured per-frame prompt data.
    async fn analyze_prompt(&self, prompt: &str) -> Result<Value, EngineError>;

    /// Analyze a character from a description and optional reference images.
    async fn analyze_character(
        &self,
        description: &str,
        images: &[ImageRef],
    ) -> Result<Value, EngineError>;

    /// Generate script scenes from a premise.
    async fn generate_script(&self, premise: &str, scene_count: u32) -> Result<Value, EngineError>;

    /// Generate character sheets from a brief.
    async fn generate_characters(&self, brief: &str) -> Result<Value, EngineError>;
}

pub struct HttpGenerationService {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpGenerationService {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn image_model<'a>(&'a self, requested: &'a str) -> &'a str {
        if requested.is_empty() {
            &self.config.image_model
        } else {
            requested
        }
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, EngineError> {
        let url = format!("{}{}", self.config.api_url, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EngineError::Remote {
                status: Some(status.as_u16()),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| EngineError::Parse(e.to_string()))?;
        serde_json::from_str(&body)
            .map_err(|e| EngineError::Parse(format!("Failed to parse response: {}", e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, EngineError> {
        let url = format!("{}{}", self.config.api_url, path);
        let mut request = self.client.get(&url);
        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EngineError::Remote {
                status: Some(status.as_u16()),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| EngineError::Parse(format!("Failed to parse response: {}", e)))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageRequest<'a> {
    prompt: &'a str,
    aspect_ratio: &'a str,
    reference_images: &'a [ImageRef],
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution: Option<&'a str>,
    client_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    image_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoRequest<'a> {
    prompt: &'a str,
    aspect_ratio: &'a str,
    resolution: &'a str,
    model: &'a str,
    client_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSubmitResponse {
    operation_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoOperationStatus {
    done: bool,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TextRequest<'a> {
    op: &'a str,
    input: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextResponse {
    text: String,
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: &str,
        reference_images: &[ImageRef],
        model: &str,
        resolution: Option<&str>,
    ) -> Result<String, EngineError> {
        let request = ImageRequest {
            prompt,
            aspect_ratio,
            reference_images,
            model: self.image_model(model),
            resolution,
            client_id: uuid::Uuid::new_v4().to_string(),
        };
        let response: ImageResponse = self.post_json("/v1/images", &request).await?;
        Ok(response.image_url)
    }

    async fn generate_video(
        &self,
        prompt: &str,
        aspect_ratio: &str,
        resolution: &str,
    ) -> Result<String, EngineError> {
        let request = VideoRequest {
            prompt,
            aspect_ratio,
            resolution,
            model: &self.config.video_model,
            client_id: uuid::Uuid::new_v4().to_string(),
        };
        let submitted: VideoSubmitResponse = self.post_json("/v1/videos", &request).await?;
        log::info!("video operation {} submitted", submitted.operation_id);

        for _ in 0..self.config.max_polls {
            tokio::time::sleep(Duration::from_secs(self.config.poll_interval_secs)).await;
            let status: VideoOperationStatus = self
                .get_json(&format!("/v1/operations/{}", submitted.operation_id))
                .await?;
            if let Some(message) = status.error {
                return Err(EngineError::Remote {
                    status: None,
                    message,
                });
            }
            if status.done {
                return status.video_url.ok_or_else(|| EngineError::Remote {
                    status: None,
                    message: "Video operation finished without a result".into(),
                });
            }
        }

        Err(EngineError::Remote {
            status: None,
            message: format!(
                "Video operation {} still pending after {} polls",
                submitted.operation_id, self.config.max_polls
            ),
        })
    }

    async fn transform_text(&self, op: TextOp, input: &str) -> Result<String, EngineError> {
        let request = TextRequest {
            op: op.as_str(),
            input,
            model: &self.config.text_model,
        };
        let response: TextResponse = self.post_json("/v1/text", &request).await?;
        Ok(response.text)
    }

    async fn describe_image(&self, image: &ImageRef) -> Result<String, EngineError> {
        let response: TextResponse = self
            .post_json(
                "/v1/text/describe-image",
                &serde_json::json!({ "image": image, "model": self.config.text_model }),
            )
            .await?;
        Ok(response.text)
    }

    async fn analyze_prompt(&self, prompt: &str) -> Result<Value, EngineError> {
        self.post_json(
            "/v1/text/analyze-prompt",
            &serde_json::json!({ "prompt": prompt, "model": self.config.text_model }),
        )
        .await
    }

    async fn analyze_character(
        &self,
        description: &str,
        images: &[ImageRef],
    ) -> Result<Value, EngineError> {
        self.post_json(
            "/v1/text/analyze-character",
            &serde_json::json!({
                "description": description,
                "images": images,
                "model": self.config.text_model,
            }),
        )
        .await
    }

    async fn generate_script(&self, premise: &str, scene_count: u32) -> Result<Value, EngineError> {
        self.post_json(
            "/v1/text/script",
            &serde_json::json!({
                "premise": premise,
                "sceneCount": scene_count,
                "model": self.config.text_model,
            }),
        )
        .await
    }

    async fn generate_characters(&self, brief: &str) -> Result<Value, EngineError> {
        self.post_json(
            "/v1/text/characters",
            &serde_json::json!({ "brief": brief, "model": self.config.text_model }),
        )
        .await
    }
}
