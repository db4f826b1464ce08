//! Camera frames and still capture

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use std::{
    io::Cursor,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::gesture::{CANVAS_HEIGHT, CANVAS_WIDTH};

/// Source of live video frames
pub trait FrameSource: Send {
    /// Latest decoded frame, or `None` while the source is not ready
    fn next_frame(&mut self) -> Option<RgbaImage>;
}

/// Replays the image files of a directory in name order
///
/// Once every file has been shown the last frame is held, which looks like
/// a camera pointed at a still scene.
pub struct DirectoryFrameSource {
    paths: Vec<PathBuf>,
    position: usize,
    last: Option<RgbaImage>,
}

impl DirectoryFrameSource {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read frames directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg")
                    })
            })
            .collect();
        paths.sort();

        info!("Replaying {} frames from {}", paths.len(), dir.display());

        Ok(Self {
            paths,
            position: 0,
            last: None,
        })
    }
}

impl FrameSource for DirectoryFrameSource {
    fn next_frame(&mut self) -> Option<RgbaImage> {
        while let Some(path) = self.paths.get(self.position) {
            self.position += 1;
            match image::open(path) {
                Ok(frame) => {
                    self.last = Some(frame.to_rgba8());
                    break;
                }
                Err(e) => warn!("Skipping unreadable frame {}: {}", path.display(), e),
            }
        }
        self.last.clone()
    }
}

/// Encode a still as a PNG data URL on the capture canvas
pub fn capture_data_url(frame: &RgbaImage) -> Result<String> {
    let still = DynamicImage::ImageRgba8(frame.clone()).resize_exact(
        CANVAS_WIDTH,
        CANVAS_HEIGHT,
        image::imageops::FilterType::Triangle,
    );

    let mut png = Vec::new();
    still
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .context("Failed to encode still as PNG")?;

    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}
