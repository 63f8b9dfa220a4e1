use canvas_contracts::settings::Settings;
use url::Url;

use crate::config::DEFAULT_IMAGE_API_BASE;

/// Image URL against the public endpoint. Same inputs, same URL.
pub fn build_image_url(prompt_text: &str, seed: i64, settings: &Settings) -> Url {
    let base = Url::parse(DEFAULT_IMAGE_API_BASE).expect("default image base is valid");
    build_image_url_with_base(&base, prompt_text, seed, settings)
}

pub fn build_image_url_with_base(
    base: &Url,
    prompt_text: &str,
    seed: i64,
    settings: &Settings,
) -> Url {
    let mut url = with_path_segments(base, &["prompt", prompt_text]);
    url.query_pairs_mut()
        .clear()
        .append_pair("width", &settings.width.to_string())
        .append_pair("height", &settings.height.to_string())
        .append_pair("seed", &seed.to_string())
        .append_pair("enhance", bool_param(settings.enhance))
        .append_pair("model", &settings.model)
        .append_pair("nologo", bool_param(settings.nologo))
        .append_pair("private", bool_param(settings.private));
    url
}

pub fn build_models_url(base: &Url) -> Url {
    with_path_segments(base, &["models"])
}

/// The whole instruction plus prompt travels as one encoded path segment.
pub fn build_enhancement_url(base: &Url, instruction: &str, prompt_text: &str) -> Url {
    with_path_segments(base, &[&format!("{instruction}{prompt_text}")])
}

fn with_path_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    url
}

fn bool_param(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use canvas_contracts::settings::Settings;
    use url::Url;

    use super::{build_enhancement_url, build_image_url, build_image_url_with_base, build_models_url};

    fn settings() -> Settings {
        Settings {
            width: 768,
            height: 512,
            seed: 11,
            enhance: false,
            model: "flux-realism".to_string(),
            nologo: true,
            private: false,
        }
    }

    fn query(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect()
    }

    #[test]
    fn serializes_prompt_and_every_setting() {
        let url = build_image_url("a cat / dog?", 42, &settings());
        assert_eq!(
            url.as_str(),
            "https://image.pollinations.ai/prompt/a%20cat%20%2F%20dog%3F\
             ?width=768&height=512&seed=42&enhance=false&model=flux-realism&nologo=true&private=false"
        );
    }

    #[test]
    fn identical_inputs_give_identical_urls() {
        let first = build_image_url("neon city in the rain", 7, &settings());
        let second = build_image_url("neon city in the rain", 7, &settings());
        assert_eq!(first, second);
    }

    #[test]
    fn varying_seed_changes_only_the_seed_parameter() {
        let a = build_image_url("harbor", 1, &settings());
        let b = build_image_url("harbor", 999_999, &settings());
        assert_eq!(a.path(), b.path());

        let (qa, qb) = (query(&a), query(&b));
        assert_eq!(qa.len(), qb.len());
        for (left, right) in qa.iter().zip(qb.iter()) {
            assert_eq!(left.0, right.0);
            if left.0 == "seed" {
                assert_eq!(left.1, "1");
                assert_eq!(right.1, "999999");
            } else {
                assert_eq!(left.1, right.1);
            }
        }
    }

    #[test]
    fn settings_seed_is_not_the_item_seed() {
        let url = build_image_url("harbor", 5, &settings());
        assert!(query(&url).contains(&("seed".to_string(), "5".to_string())));
    }

    #[test]
    fn respects_configured_base_path() -> anyhow::Result<()> {
        let base = Url::parse("http://127.0.0.1:8080/mock")?;
        let url = build_image_url_with_base(&base, "fox", 3, &settings());
        assert_eq!(url.path(), "/mock/prompt/fox");
        assert_eq!(build_models_url(&base).as_str(), "http://127.0.0.1:8080/mock/models");
        Ok(())
    }

    #[test]
    fn enhancement_url_is_a_single_segment() -> anyhow::Result<()> {
        let base = Url::parse("https://text.pollinations.ai")?;
        let url = build_enhancement_url(&base, "Improve: ", "a/b");
        assert_eq!(url.as_str(), "https://text.pollinations.ai/Improve:%20a%2Fb");
        Ok(())
    }
}
