use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use image::ImageFormat;

use crate::orchestrator::LoadedImage;

pub const DOWNLOAD_PREFIX: &str = "dream-canvas";

/// Saves already-fetched image bytes as `dream-canvas-{unix_millis}.png`.
pub fn save_image(image: &LoadedImage, dir: &Path) -> Result<PathBuf> {
    save_image_at(image, dir, timestamp_millis())
}

pub fn save_image_at(image: &LoadedImage, dir: &Path, millis: u128) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let decoded = image::load_from_memory(&image.bytes)
        .with_context(|| format!("downloaded bytes for {} are not an image", image.url))?;

    let mut stamp = millis;
    let mut path = dir.join(download_file_name(stamp));
    while path.exists() {
        stamp += 1;
        path = dir.join(download_file_name(stamp));
    }
    decoded
        .save_with_format(&path, ImageFormat::Png)
        .with_context(|| format!("failed to save {}", path.display()))?;
    Ok(path)
}

pub fn download_file_name(millis: u128) -> String {
    format!("{DOWNLOAD_PREFIX}-{millis}.png")
}

fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}
