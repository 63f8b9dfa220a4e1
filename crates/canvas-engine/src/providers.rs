use anyhow::{bail, Context, Result};
use canvas_contracts::models::ModelCatalog;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::Value;
use url::Url;

use crate::config::EndpointConfig;
use crate::request::{build_enhancement_url, build_models_url};

/// Fixed instruction sent ahead of the user's prompt to the text endpoint.
pub const ENHANCEMENT_INSTRUCTION: &str = "You are an artificial intelligence that improves image \
prompts. Rewrite the prompt given by the user into a detailed, vivid image description and reply \
with the improved prompt only, nothing else. Rules: 1. Always produce an image description, even \
for vague or general prompts. 2. Never produce sexually explicit or harmful content; if the user \
asks for it, describe something beautiful instead. 3. Never ask the user any question or request \
clarification. 4. Keep any style or theme the user asks for. Keep the prompt creative and \
beautiful. User prompt: ";

/// Bytes of an image that was fetched and decoded successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub mime_type: Option<String>,
}

pub trait ImageSource: Send + Sync {
    /// Succeeds only when the response is 2xx and the body decodes as an image.
    fn fetch_image(&self, url: &Url) -> Result<FetchedImage>;
}

pub trait PromptEnhancer: Send + Sync {
    fn enhance(&self, prompt: &str) -> Result<String>;
}

pub trait ModelSource: Send + Sync {
    fn list_models(&self) -> Result<Vec<String>>;
}

/// Blocking client for the hosted image, text and model-list endpoints.
#[derive(Debug, Clone)]
pub struct PollinationsClient {
    config: EndpointConfig,
    http: HttpClient,
}

impl PollinationsClient {
    pub fn new(config: EndpointConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    fn get(&self, url: &Url, what: &str) -> Result<HttpResponse> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .with_context(|| format!("{what} request failed ({url})"))?;
        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            bail!("{what} request failed ({code}): {}", truncate_text(&body, 256));
        }
        Ok(response)
    }
}

impl ImageSource for PollinationsClient {
    fn fetch_image(&self, url: &Url) -> Result<FetchedImage> {
        let response = self.get(url, "image")?;
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .context("failed reading image bytes")?
            .to_vec();
        decode_image_bytes(bytes, mime_type)
    }
}

impl PromptEnhancer for PollinationsClient {
    fn enhance(&self, prompt: &str) -> Result<String> {
        let url = build_enhancement_url(&self.config.text_base, ENHANCEMENT_INSTRUCTION, prompt);
        let body = self
            .get(&url, "prompt enhancement")?
            .text()
            .context("prompt enhancement body read failed")?;
        normalize_enhanced_text(&body)
    }
}

impl ModelSource for PollinationsClient {
    fn list_models(&self) -> Result<Vec<String>> {
        let url = build_models_url(&self.config.image_base);
        let body = self
            .get(&url, "model list")?
            .text()
            .context("model list body read failed")?;
        let parsed: Value =
            serde_json::from_str(&body).context("model list returned invalid JSON payload")?;
        parse_model_list(&parsed)
    }
}

/// Fetches the model list once; failures degrade to the default model.
pub fn load_model_catalog(source: &dyn ModelSource) -> ModelCatalog {
    ModelCatalog::from_result(source.list_models())
}

pub fn decode_image_bytes(bytes: Vec<u8>, mime_type: Option<String>) -> Result<FetchedImage> {
    if bytes.is_empty() {
        bail!("image response body was empty");
    }
    let decoded = image::load_from_memory(&bytes).context("image payload could not be decoded")?;
    Ok(FetchedImage {
        width: decoded.width(),
        height: decoded.height(),
        bytes,
        mime_type,
    })
}

pub fn normalize_enhanced_text(body: &str) -> Result<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        bail!("prompt enhancement returned an empty body");
    }
    Ok(trimmed.to_string())
}

/// Accepts either plain names or objects carrying a `name` field.
pub fn parse_model_list(payload: &Value) -> Result<Vec<String>> {
    let Some(rows) = payload.as_array() else {
        bail!("model list payload is not an array");
    };
    Ok(rows
        .iter()
        .filter_map(|row| match row {
            Value::String(name) => Some(name.trim().to_string()),
            Value::Object(obj) => obj
                .get("name")
                .and_then(Value::as_str)
                .map(|name| name.trim().to_string()),
            _ => None,
        })
        .filter(|name| !name.is_empty())
        .collect())
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage};
    use serde_json::json;

    use super::{
        decode_image_bytes, load_model_catalog, normalize_enhanced_text, parse_model_list,
        truncate_text, ModelSource, ENHANCEMENT_INSTRUCTION,
    };

    struct StaticModels(Option<Vec<String>>);

    impl ModelSource for StaticModels {
        fn list_models(&self) -> anyhow::Result<Vec<String>> {
            self.0
                .clone()
                .ok_or_else(|| anyhow::anyhow!("model list request failed (500)"))
        }
    }

    fn png_bytes(width: u32, height: u32) -> anyhow::Result<Vec<u8>> {
        let image = RgbImage::from_pixel(width, height, Rgb([12, 34, 56]));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    #[test]
    fn decodes_valid_image_payload() -> anyhow::Result<()> {
        let fetched = decode_image_bytes(png_bytes(8, 4)?, Some("image/png".to_string()))?;
        assert_eq!((fetched.width, fetched.height), (8, 4));
        assert_eq!(fetched.mime_type.as_deref(), Some("image/png"));
        Ok(())
    }

    #[test]
    fn rejects_empty_and_undecodable_payloads() {
        assert!(decode_image_bytes(Vec::new(), None).is_err());
        let err = decode_image_bytes(b"<html>rate limited</html>".to_vec(), None)
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert_eq!(err, "image payload could not be decoded");
    }

    #[test]
    fn enhancement_body_is_trimmed_and_must_not_be_empty() -> anyhow::Result<()> {
        assert_eq!(
            normalize_enhanced_text("  A misty harbor at dawn.\n")?,
            "A misty harbor at dawn."
        );
        assert!(normalize_enhanced_text(" \n\t").is_err());
        Ok(())
    }

    #[test]
    fn model_list_accepts_names_and_objects() -> anyhow::Result<()> {
        let models = parse_model_list(&json!(["flux", {"name": "turbo"}, 3, " ", {"id": "x"}]))?;
        assert_eq!(models, vec!["flux", "turbo"]);
        assert!(parse_model_list(&json!({"models": []})).is_err());
        Ok(())
    }

    #[test]
    fn model_catalog_falls_back_on_fetch_failure() {
        let loaded = load_model_catalog(&StaticModels(Some(vec!["flux".to_string()])));
        assert_eq!(loaded.models().collect::<Vec<_>>(), vec!["flux"]);
        assert!(loaded.warning().is_none());

        let fallback = load_model_catalog(&StaticModels(None));
        assert_eq!(fallback.models().collect::<Vec<_>>(), vec!["flux-realism"]);
        assert!(fallback.warning().unwrap_or_default().contains("500"));
    }

    #[test]
    fn instruction_forbids_questions_and_explicit_content() {
        let lowered = ENHANCEMENT_INSTRUCTION.to_ascii_lowercase();
        assert!(lowered.contains("image description"));
        assert!(lowered.contains("never produce sexually explicit"));
        assert!(lowered.contains("never ask the user any question"));
    }

    #[test]
    fn truncates_long_error_bodies() {
        assert_eq!(truncate_text("abcdef", 3), "abc…");
        assert_eq!(truncate_text("abc", 3), "abc");
    }
}
