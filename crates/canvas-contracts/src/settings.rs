use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "flux-realism";
pub const MIN_DIMENSION: u32 = 64;
pub const MAX_DIMENSION: u32 = 1024;
pub const DIMENSION_STEP: u32 = 64;
pub const SEED_RANGE_END: i64 = 1_000_000;

/// Generation settings as edited in the settings panel.
///
/// The orchestrator clones this at the start of a run, so edits made while a
/// run is in flight only apply to the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub width: u32,
    pub height: u32,
    pub seed: i64,
    pub enhance: bool,
    pub model: String,
    pub nologo: bool,
    pub private: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            seed: random_seed(),
            enhance: true,
            model: DEFAULT_MODEL.to_string(),
            nologo: true,
            private: true,
        }
    }
}

impl Settings {
    pub fn set_width(&mut self, value: i64) -> u32 {
        self.width = snap_dimension(value);
        self.width
    }

    pub fn set_height(&mut self, value: i64) -> u32 {
        self.height = snap_dimension(value);
        self.height
    }

    pub fn set_model(&mut self, model: &str) {
        let trimmed = model.trim();
        self.model = if trimmed.is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            trimmed.to_string()
        };
    }

    pub fn reseed(&mut self) -> i64 {
        self.seed = random_seed();
        self.seed
    }

    /// Problems the settings editor should refuse, one message per field.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&value) {
                problems.push(format!(
                    "{name} {value} outside [{MIN_DIMENSION}, {MAX_DIMENSION}]"
                ));
            } else if value % DIMENSION_STEP != 0 {
                problems.push(format!("{name} {value} is not a multiple of {DIMENSION_STEP}"));
            }
        }
        if self.model.trim().is_empty() {
            problems.push("model must not be empty".to_string());
        }
        problems
    }
}

pub fn random_seed() -> i64 {
    rand::thread_rng().gen_range(0..SEED_RANGE_END)
}

/// Rounds to the nearest step and clamps into the allowed range.
pub fn snap_dimension(value: i64) -> u32 {
    let step = DIMENSION_STEP as i64;
    let snapped = ((value + step / 2).div_euclid(step)) * step;
    snapped.clamp(MIN_DIMENSION as i64, MAX_DIMENSION as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::{snap_dimension, Settings, DEFAULT_MODEL, SEED_RANGE_END};

    #[test]
    fn defaults_match_the_settings_panel() {
        let settings = Settings::default();
        assert_eq!(settings.width, 512);
        assert_eq!(settings.height, 512);
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert!(settings.enhance && settings.nologo && settings.private);
        assert!((0..SEED_RANGE_END).contains(&settings.seed));
        assert!(settings.validate().is_empty());
    }

    #[test]
    fn dimensions_snap_to_step_and_clamp() {
        assert_eq!(snap_dimension(512), 512);
        assert_eq!(snap_dimension(700), 704);
        assert_eq!(snap_dimension(31), 64);
        assert_eq!(snap_dimension(-400), 64);
        assert_eq!(snap_dimension(5000), 1024);

        let mut settings = Settings::default();
        assert_eq!(settings.set_width(1000), 1024);
        assert_eq!(settings.set_height(100), 128);
    }

    #[test]
    fn validate_reports_each_bad_field() {
        let settings = Settings {
            width: 100,
            height: 2048,
            model: "  ".to_string(),
            ..Settings::default()
        };
        let problems = settings.validate();
        assert_eq!(problems.len(), 3);
        assert!(problems[0].contains("multiple of 64"));
        assert!(problems[1].contains("outside"));
    }

    #[test]
    fn blank_model_falls_back_to_default() {
        let mut settings = Settings::default();
        settings.set_model("turbo");
        assert_eq!(settings.model, "turbo");
        settings.set_model("   ");
        assert_eq!(settings.model, DEFAULT_MODEL);
    }
}
