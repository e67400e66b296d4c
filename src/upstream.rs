use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ApiError;

const TEXT_TIMEOUT: Duration = Duration::from_secs(45);
const IMAGE_TIMEOUT: Duration = Duration::from_secs(120);
const VIDEO_TIMEOUT: Duration = Duration::from_secs(300);

const REFERER: &str = "https://brandstudio.local";
const TITLE: &str = "Brand Studio";

/// Fixed defaults for video generation; a turn can override them but the
/// console currently never does.
#[derive(Debug, Clone)]
pub struct VideoParams {
    pub aspect_ratio: String,
    pub duration_seconds: u32,
    pub audio: bool,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            aspect_ratio: "16:9".to_string(),
            duration_seconds: 6,
            audio: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageResult {
    pub text: String,
    pub image_url: String,
}

#[derive(Debug, Clone)]
pub struct VideoResult {
    pub video_url: String,
}

/// The model-serving API, seen as a remote, possibly-failing black box.
/// One round trip per call; retries are the user's job.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn list_models(&self) -> Result<Vec<Value>, ApiError>;
    async fn complete(&self, model: &str, messages: &[Value]) -> Result<String, ApiError>;
    async fn generate_image(&self, model: &str, prompt: &str) -> Result<ImageResult, ApiError>;
    async fn generate_video(
        &self,
        model: &str,
        prompt: &str,
        params: &VideoParams,
    ) -> Result<VideoResult, ApiError>;
}

pub struct OpenRouterBackend {
    base_url: String,
    api_key: String,
    text_client: reqwest::Client,
    image_client: reqwest::Client,
    video_client: reqwest::Client,
}

impl OpenRouterBackend {
    pub fn new(base_url: String, api_key: String) -> Result<Self, String> {
        let build = |timeout: Duration| {
            reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| format!("build upstream client failed: {e}"))
        };

        Ok(Self {
            base_url,
            api_key,
            text_client: build(TEXT_TIMEOUT)?,
            image_client: build(IMAGE_TIMEOUT)?,
            video_client: build(VIDEO_TIMEOUT)?,
        })
    }

    async fn post_json(
        &self,
        client: &reqwest::Client,
        path: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        let response = client
            .post(format!("{}{path}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("upstream request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Upstream(format!(
                "upstream returned status {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("parse upstream response failed: {e}")))
    }
}

#[async_trait]
impl ModelBackend for OpenRouterBackend {
    async fn list_models(&self) -> Result<Vec<Value>, ApiError> {
        let response = self
            .text_client
            .get(format!("{}/models", self.base_url))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("model list fetch failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Upstream(format!(
                "model list returned status {status}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("parse model list failed: {e}")))?;

        body["data"]
            .as_array()
            .cloned()
            .ok_or_else(|| ApiError::Upstream("model list missing data array".to_string()))
    }

    async fn complete(&self, model: &str, messages: &[Value]) -> Result<String, ApiError> {
        let body = json!({"model": model, "messages": messages});
        let response = self
            .post_json(&self.text_client, "/chat/completions", &body)
            .await?;

        response["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ApiError::Upstream("completion had no content".to_string()))
    }

    async fn generate_image(&self, model: &str, prompt: &str) -> Result<ImageResult, ApiError> {
        let body = json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "modalities": ["image", "text"],
            "stream": false,
        });
        let response = self
            .post_json(&self.image_client, "/chat/completions", &body)
            .await?;

        let image_url = extract_image_url(&response)
            .ok_or_else(|| ApiError::Upstream("no image produced".to_string()))?;
        let text = response["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(ImageResult { text, image_url })
    }

    async fn generate_video(
        &self,
        model: &str,
        prompt: &str,
        params: &VideoParams,
    ) -> Result<VideoResult, ApiError> {
        let body = json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "modalities": ["video"],
            "video": {
                "aspect_ratio": params.aspect_ratio,
                "duration_seconds": params.duration_seconds,
                "audio": params.audio,
            },
        });
        let response = self
            .post_json(&self.video_client, "/chat/completions", &body)
            .await?;

        let video_url = extract_video_url(&response)
            .ok_or_else(|| ApiError::Upstream("no video produced".to_string()))?;
        Ok(VideoResult { video_url })
    }
}

// The upstream has shipped two result shapes for generated media, the
// nested `{"image_url": {"url": …}}` form and a flat `{"url": …}`. Both are
// treated as authoritative; it is unclear which (if either) is legacy, so
// they are tried in order rather than one being dropped.
pub(crate) fn extract_image_url(response: &Value) -> Option<String> {
    let first = &response["choices"][0]["message"]["images"][0];
    first["image_url"]["url"]
        .as_str()
        .or_else(|| first["url"].as_str())
        .map(|s| s.to_string())
}

pub(crate) fn extract_video_url(response: &Value) -> Option<String> {
    let first = &response["choices"][0]["message"]["videos"][0];
    first["video_url"]["url"]
        .as_str()
        .or_else(|| first["url"].as_str())
        .map(|s| s.to_string())
}
