use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

pub const DEFAULT_IMAGE_API_BASE: &str = "https://image.pollinations.ai";
pub const DEFAULT_TEXT_API_BASE: &str = "https://text.pollinations.ai";
const DEFAULT_HTTP_TIMEOUT_S: f64 = 120.0;

/// Where the hosted collaborators live and how long a single request may take.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointConfig {
    pub image_base: Url,
    pub text_base: Url,
    pub timeout: Duration,
}

impl EndpointConfig {
    pub fn from_env() -> Result<Self> {
        let image_base = non_empty_env("CANVAS_IMAGE_API_BASE")
            .unwrap_or_else(|| DEFAULT_IMAGE_API_BASE.to_string());
        let text_base = non_empty_env("CANVAS_TEXT_API_BASE")
            .unwrap_or_else(|| DEFAULT_TEXT_API_BASE.to_string());
        let timeout_s = non_empty_env("CANVAS_HTTP_TIMEOUT")
            .and_then(|value| value.parse::<f64>().ok())
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_S)
            .clamp(5.0, 600.0);
        Self::new(&image_base, &text_base, Duration::from_secs_f64(timeout_s))
    }

    pub fn new(image_base: &str, text_base: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            image_base: parse_base(image_base)
                .with_context(|| format!("invalid image API base ({image_base})"))?,
            text_base: parse_base(text_base)
                .with_context(|| format!("invalid text API base ({text_base})"))?,
            timeout,
        })
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            image_base: Url::parse(DEFAULT_IMAGE_API_BASE).expect("default image base is valid"),
            text_base: Url::parse(DEFAULT_TEXT_API_BASE).expect("default text base is valid"),
            timeout: Duration::from_secs_f64(DEFAULT_HTTP_TIMEOUT_S),
        }
    }
}

fn parse_base(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed)?;
    if url.cannot_be_a_base() {
        anyhow::bail!("URL cannot be used as a base");
    }
    Ok(url)
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{EndpointConfig, DEFAULT_IMAGE_API_BASE};

    #[test]
    fn new_trims_trailing_slashes() -> anyhow::Result<()> {
        let config = EndpointConfig::new(
            "http://127.0.0.1:9000/images/",
            "http://127.0.0.1:9001",
            Duration::from_secs(5),
        )?;
        assert_eq!(config.image_base.as_str(), "http://127.0.0.1:9000/images");
        assert_eq!(config.text_base.host_str(), Some("127.0.0.1"));
        Ok(())
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(EndpointConfig::new("mailto:someone", DEFAULT_IMAGE_API_BASE, Duration::from_secs(5))
            .is_err());
        assert!(EndpointConfig::new("not a url", DEFAULT_IMAGE_API_BASE, Duration::from_secs(5))
            .is_err());
    }
}
