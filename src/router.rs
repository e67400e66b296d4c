use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::info;

use crate::catalog::{self, ModelCapability};
use crate::countdown::christmas_countdown;
use crate::error::ApiError;
use crate::models::{Message, TurnRequest};
use crate::upstream::{ModelBackend, VideoParams};

pub const FALLBACK_TEXT_MODEL: &str = "meta-llama/llama-3.3-70b-instruct:free";

pub const MODE_IMAGE: &str = "Image Prompts";
pub const MODE_VIDEO: &str = "Video Prompts";

/// Routes one user turn to the right upstream capability and maps the
/// result into the single assistant message to append.
///
/// `now` is the server wall clock; a parseable `clientDate` on the turn
/// overrides it. The effective timestamp is the only notion of "today"
/// that ever reaches a model.
pub async fn route_turn(
    backend: &dyn ModelBackend,
    turn: &TurnRequest,
    now: DateTime<Utc>,
) -> Result<Message, ApiError> {
    let prompt = turn.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::Input("prompt is empty".to_string()));
    }

    let effective = effective_timestamp(turn.client_date.as_deref(), now);

    if let Some(reply) = christmas_countdown(prompt, effective) {
        info!(mode = %turn.mode, "turn answered locally by countdown");
        return Ok(Message::assistant_text(reply));
    }

    match turn.mode.as_str() {
        MODE_IMAGE => {
            match resolve_model(backend, turn.model_id.as_deref(), ModelCapability::Image).await? {
                Some(model) => image_turn(backend, &model, prompt).await,
                // No image-capable model selectable; fall through to text.
                None => text_turn(backend, turn, prompt, effective).await,
            }
        }
        MODE_VIDEO => {
            let model = resolve_model(backend, turn.model_id.as_deref(), ModelCapability::Video)
                .await?
                .ok_or_else(|| {
                    ApiError::Input("no video-capable model available".to_string())
                })?;
            video_turn(backend, &model, prompt).await
        }
        _ => text_turn(backend, turn, prompt, effective).await,
    }
}

fn effective_timestamp(client_date: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    client_date
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

/// Explicitly selected model, else the first entry of the filtered+ranked
/// listing for the capability, else None.
async fn resolve_model(
    backend: &dyn ModelBackend,
    selected: Option<&str>,
    capability: ModelCapability,
) -> Result<Option<String>, ApiError> {
    if let Some(id) = selected {
        return Ok(Some(id.to_string()));
    }

    let raw = backend.list_models().await?;
    let descriptors = catalog::normalize_models(&raw);
    let listing = catalog::models_for_capability(&descriptors, capability);
    Ok(listing.first().map(|m| m.id.clone()))
}

async fn text_turn(
    backend: &dyn ModelBackend,
    turn: &TurnRequest,
    prompt: &str,
    effective: DateTime<Utc>,
) -> Result<Message, ApiError> {
    let model = turn.model_id.as_deref().unwrap_or(FALLBACK_TEXT_MODEL);
    let messages: Vec<Value> = vec![
        json!({
            "role": "system",
            "content": build_system_prompt(&turn.brand, &turn.mode, effective),
        }),
        json!({"role": "user", "content": prompt}),
    ];

    info!(%model, mode = %turn.mode, "routing turn to text completion");
    let reply = backend.complete(model, &messages).await?;
    Ok(Message::assistant_text(reply))
}

async fn image_turn(
    backend: &dyn ModelBackend,
    model: &str,
    prompt: &str,
) -> Result<Message, ApiError> {
    info!(%model, "routing turn to image generation");
    let result = backend.generate_image(model, prompt).await?;
    let caption = if result.text.is_empty() {
        "Here is the generated image.".to_string()
    } else {
        result.text
    };
    Ok(Message::assistant_image(caption, result.image_url))
}

async fn video_turn(
    backend: &dyn ModelBackend,
    model: &str,
    prompt: &str,
) -> Result<Message, ApiError> {
    info!(%model, "routing turn to video generation");
    let result = backend
        .generate_video(model, prompt, &VideoParams::default())
        .await?;
    Ok(Message::assistant_video(
        "Here is the generated video.".to_string(),
        result.video_url,
    ))
}

fn build_system_prompt(brand: &str, mode: &str, effective: DateTime<Utc>) -> String {
    let human = effective.format("%A, %B %e, %Y at %H:%M UTC");
    let iso = effective.to_rfc3339_opts(SecondsFormat::Secs, true);
    format!(
        "You are the brand assistant for {brand}, operating in {mode} mode. \
         The current date and time is {human} ({iso}). Treat this timestamp \
         as the authoritative present for all temporal reasoning, including \
         relative dates and seasonal context, and disregard any internal \
         assumption about today's date."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{ImageResult, VideoResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockBackend {
        calls: Mutex<Vec<String>>,
        models: Vec<Value>,
        image_fails: bool,
    }

    impl MockBackend {
        fn recorded(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl ModelBackend for MockBackend {
        async fn list_models(&self) -> Result<Vec<Value>, ApiError> {
            self.record("list_models".to_string());
            Ok(self.models.clone())
        }

        async fn complete(&self, model: &str, messages: &[Value]) -> Result<String, ApiError> {
            self.record(format!("complete:{model}"));
            let system = messages[0]["content"].as_str().unwrap_or_default();
            Ok(format!("echo [{system}]"))
        }

        async fn generate_image(
            &self,
            model: &str,
            _prompt: &str,
        ) -> Result<ImageResult, ApiError> {
            self.record(format!("generate_image:{model}"));
            if self.image_fails {
                return Err(ApiError::Upstream("no image produced".to_string()));
            }
            Ok(ImageResult {
                text: String::new(),
                image_url: "https://img/out.png".to_string(),
            })
        }

        async fn generate_video(
            &self,
            model: &str,
            _prompt: &str,
            params: &VideoParams,
        ) -> Result<VideoResult, ApiError> {
            self.record(format!(
                "generate_video:{model}:{}:{}:{}",
                params.aspect_ratio, params.duration_seconds, params.audio
            ));
            Ok(VideoResult {
                video_url: "https://vid/out.mp4".to_string(),
            })
        }
    }

    fn turn(prompt: &str, mode: &str, model_id: Option<&str>) -> TurnRequest {
        TurnRequest {
            prompt: prompt.to_string(),
            brand: "Acme".to_string(),
            mode: mode.to_string(),
            model_id: model_id.map(|s| s.to_string()),
            client_date: None,
        }
    }

    fn at(iso: &str) -> DateTime<Utc> {
        iso.parse().unwrap()
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_with_zero_upstream_calls() {
        let backend = MockBackend::default();
        for prompt in ["", "   ", "\n\t"] {
            let err = route_turn(&backend, &turn(prompt, "Chat", None), Utc::now())
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::Input(_)));
        }
        assert!(backend.recorded().is_empty());
    }

    #[tokio::test]
    async fn countdown_prompt_never_reaches_upstream() {
        let backend = MockBackend::default();
        let mut request = turn("How many days until christmas 2026?", "Chat", None);
        request.client_date = Some("2025-01-01T00:00:00Z".to_string());

        let message = route_turn(&backend, &request, at("2024-06-01T00:00:00Z"))
            .await
            .unwrap();

        assert_eq!(message.role, "assistant");
        assert!(message.text.contains("723 days"), "got: {}", message.text);
        assert!(backend.recorded().is_empty());
    }

    #[tokio::test]
    async fn text_turn_uses_fallback_model_and_effective_date() {
        let backend = MockBackend::default();
        let mut request = turn("plan a spring campaign", "Chat", None);
        request.client_date = Some("2025-03-10T09:30:00Z".to_string());

        let message = route_turn(&backend, &request, at("2020-01-01T00:00:00Z"))
            .await
            .unwrap();

        assert_eq!(
            backend.recorded(),
            vec![format!("complete:{FALLBACK_TEXT_MODEL}")]
        );
        // The mock echoes the system prompt; the client date must be the
        // one spelled out, not the server clock.
        assert!(message.text.contains("2025-03-10T09:30:00Z"));
        assert!(message.text.contains("Acme"));
        assert!(message.text.contains("Chat mode"));
    }

    #[tokio::test]
    async fn unparseable_client_date_falls_back_to_server_clock() {
        let backend = MockBackend::default();
        let mut request = turn("hello", "Chat", None);
        request.client_date = Some("yesterday-ish".to_string());

        let message = route_turn(&backend, &request, at("2025-08-23T00:00:00Z"))
            .await
            .unwrap();
        assert!(message.text.contains("2025-08-23T00:00:00Z"));
    }

    #[tokio::test]
    async fn image_mode_with_selected_model_generates_image() {
        let backend = MockBackend::default();
        let request = turn("a red bicycle", MODE_IMAGE, Some("img/model"));

        let message = route_turn(&backend, &request, Utc::now()).await.unwrap();

        assert_eq!(backend.recorded(), vec!["generate_image:img/model"]);
        assert_eq!(message.image_url.as_deref(), Some("https://img/out.png"));
        assert!(!message.text.is_empty());
    }

    #[tokio::test]
    async fn image_mode_without_model_picks_first_ranked_capable() {
        let backend = MockBackend {
            models: vec![
                json!({"id": "text-only", "pricing": {"prompt": "0", "completion": "0"}}),
                json!({
                    "id": "paid-image",
                    "pricing": {"prompt": "0.002", "completion": "0.002"},
                    "architecture": {"output_modalities": ["text", "image"]}
                }),
                json!({
                    "id": "free-image",
                    "pricing": {"prompt": "0", "completion": "0"},
                    "architecture": {"output_modalities": ["text", "image"]}
                }),
            ],
            ..Default::default()
        };
        let request = turn("a red bicycle", MODE_IMAGE, None);

        route_turn(&backend, &request, Utc::now()).await.unwrap();

        assert_eq!(
            backend.recorded(),
            vec!["list_models".to_string(), "generate_image:free-image".to_string()]
        );
    }

    #[tokio::test]
    async fn image_mode_without_capable_models_falls_back_to_text() {
        let backend = MockBackend {
            models: vec![json!({"id": "text-only"})],
            ..Default::default()
        };
        let request = turn("a red bicycle", MODE_IMAGE, None);

        let message = route_turn(&backend, &request, Utc::now()).await.unwrap();

        assert_eq!(
            backend.recorded(),
            vec![
                "list_models".to_string(),
                format!("complete:{FALLBACK_TEXT_MODEL}")
            ]
        );
        assert!(message.image_url.is_none());
    }

    #[tokio::test]
    async fn video_mode_sends_fixed_generation_defaults() {
        let backend = MockBackend::default();
        let request = turn("product teaser", MODE_VIDEO, Some("vid/model"));

        let message = route_turn(&backend, &request, Utc::now()).await.unwrap();

        assert_eq!(backend.recorded(), vec!["generate_video:vid/model:16:9:6:true"]);
        assert_eq!(message.kind.as_deref(), Some("video"));
        assert_eq!(message.video_url.as_deref(), Some("https://vid/out.mp4"));
    }

    #[tokio::test]
    async fn video_mode_with_no_capable_model_is_an_input_error() {
        let backend = MockBackend {
            models: vec![json!({"id": "text-only"})],
            ..Default::default()
        };
        let request = turn("product teaser", MODE_VIDEO, None);

        let err = route_turn(&backend, &request, Utc::now()).await.unwrap_err();
        assert!(matches!(err, ApiError::Input(_)));
    }

    #[tokio::test]
    async fn image_failure_surfaces_as_upstream_error() {
        let backend = MockBackend {
            image_fails: true,
            ..Default::default()
        };
        let request = turn("a red bicycle", MODE_IMAGE, Some("img/model"));

        let err = route_turn(&backend, &request, Utc::now()).await.unwrap_err();
        assert_eq!(err, ApiError::Upstream("no image produced".to_string()));
    }
}
