use serde::{Deserialize, Serialize};

use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Loaded,
    Failed,
}

impl ItemStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ItemStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Loaded => "loaded",
            ItemStatus::Failed => "failed",
        }
    }
}

/// The subset of settings recorded alongside every image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageParams {
    pub width: u32,
    pub height: u32,
    pub enhance: bool,
    pub model: String,
}

impl From<&Settings> for ImageParams {
    fn from(settings: &Settings) -> Self {
        Self {
            width: settings.width,
            height: settings.height,
            enhance: settings.enhance,
            model: settings.model.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub seed: i64,
    pub params: ImageParams,
    pub timestamp: String,
}

/// One image of a batch. `url` is fixed at creation; `status` only moves
/// forward from `Pending` to a terminal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequestItem {
    url: String,
    status: ItemStatus,
    metadata: ImageMetadata,
}

impl ImageRequestItem {
    pub fn new(url: impl Into<String>, metadata: ImageMetadata) -> Self {
        Self {
            url: url.into(),
            status: ItemStatus::Pending,
            metadata,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn seed(&self) -> i64 {
        self.metadata.seed
    }

    pub fn params(&self) -> &ImageParams {
        &self.metadata.params
    }

    pub fn timestamp(&self) -> &str {
        &self.metadata.timestamp
    }

    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    /// Applies a terminal outcome. Returns `false` when the item already
    /// settled or `status` is not terminal.
    pub fn settle(&mut self, status: ItemStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{ImageMetadata, ImageParams, ImageRequestItem, ItemStatus};

    fn item() -> ImageRequestItem {
        ImageRequestItem::new(
            "https://image.example/prompt/fox?seed=7",
            ImageMetadata {
                seed: 7,
                params: ImageParams {
                    width: 512,
                    height: 512,
                    enhance: true,
                    model: "flux-realism".to_string(),
                },
                timestamp: "2026-10-16T00:00:00.000Z".to_string(),
            },
        )
    }

    #[test]
    fn item_settles_exactly_once() {
        let mut item = item();
        assert_eq!(item.status(), ItemStatus::Pending);
        assert!(item.settle(ItemStatus::Loaded));
        assert!(!item.settle(ItemStatus::Failed));
        assert_eq!(item.status(), ItemStatus::Loaded);
    }

    #[test]
    fn item_never_returns_to_pending() {
        let mut item = item();
        assert!(!item.settle(ItemStatus::Pending));
        assert!(item.settle(ItemStatus::Failed));
        assert!(!item.settle(ItemStatus::Pending));
        assert_eq!(item.status(), ItemStatus::Failed);
        assert_eq!(item.seed(), 7);
    }
}
