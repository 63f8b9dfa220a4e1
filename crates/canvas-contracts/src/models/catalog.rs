use indexmap::IndexSet;

use crate::settings::DEFAULT_MODEL;

/// Image models offered by the settings panel.
///
/// Built once per session from the model list endpoint. A failed or empty
/// fetch degrades to the default model and keeps the reason as a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    models: IndexSet<String>,
    warning: Option<String>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::fallback("model list not loaded")
    }
}

impl ModelCatalog {
    pub fn new(models: impl IntoIterator<Item = String>) -> Self {
        let models: IndexSet<String> = models
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        if models.is_empty() {
            return Self::fallback("model list was empty");
        }
        Self {
            models,
            warning: None,
        }
    }

    pub fn fallback(reason: impl Into<String>) -> Self {
        let mut models = IndexSet::new();
        models.insert(DEFAULT_MODEL.to_string());
        Self {
            models,
            warning: Some(reason.into()),
        }
    }

    pub fn from_result(result: anyhow::Result<Vec<String>>) -> Self {
        match result {
            Ok(models) => Self::new(models),
            Err(err) => Self::fallback(format!("Failed to load models: {err:#}")),
        }
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains(name.trim())
    }

    /// `flux-realism` when offered, otherwise the first listed model.
    pub fn default_model(&self) -> &str {
        if self.models.contains(DEFAULT_MODEL) {
            return DEFAULT_MODEL;
        }
        self.models
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_MODEL)
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }
}
