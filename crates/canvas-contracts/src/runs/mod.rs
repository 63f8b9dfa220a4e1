mod items;
mod status;

pub use items::{ImageMetadata, ImageParams, ImageRequestItem, ItemStatus};
pub use status::{GenerationRun, RunStatus};
