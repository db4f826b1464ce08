//! Frame-difference liveness gesture detection
//!
//! Every frame is drawn onto the fixed capture canvas and a rectangle on
//! its right edge is sampled. Two consecutive samples are compared by the
//! mean, over pixels, of the summed absolute red, green and blue
//! differences; a wave in front of the camera pushes that mean over the
//! threshold while a photo held still does not.

use image::{RgbaImage, imageops::FilterType};
use tracing::debug;

/// Capture canvas width every frame is normalised to
pub const CANVAS_WIDTH: u32 = 320;
/// Capture canvas height every frame is normalised to
pub const CANVAS_HEIGHT: u32 = 240;
/// Default motion threshold
pub const DEFAULT_THRESHOLD: f64 = 30.0;

/// Region of the canvas that is sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for SampleRect {
    fn default() -> Self {
        Self {
            x: CANVAS_WIDTH - 100,
            y: 50,
            width: 80,
            height: 100,
        }
    }
}

/// Pixels of the sample rectangle from one frame
#[derive(Debug, Clone)]
pub struct MotionSample(RgbaImage);

impl MotionSample {
    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }
}

/// Detects motion between consecutive frames
#[derive(Debug)]
pub struct GestureDetector {
    rect: SampleRect,
    threshold: f64,
    previous: Option<MotionSample>,
}

impl Default for GestureDetector {
    fn default() -> Self {
        Self::new(SampleRect::default(), DEFAULT_THRESHOLD)
    }
}

impl GestureDetector {
    /// Create a detector; the rectangle is clamped to the canvas
    pub fn new(rect: SampleRect, threshold: f64) -> Self {
        let x = rect.x.min(CANVAS_WIDTH - 1);
        let y = rect.y.min(CANVAS_HEIGHT - 1);
        let rect = SampleRect {
            x,
            y,
            width: rect.width.clamp(1, CANVAS_WIDTH - x),
            height: rect.height.clamp(1, CANVAS_HEIGHT - y),
        };

        Self {
            rect,
            threshold,
            previous: None,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Extract the sample rectangle from a frame
    pub fn sample(&self, frame: &RgbaImage) -> MotionSample {
        let r = self.rect;
        let pixels = if frame.dimensions() == (CANVAS_WIDTH, CANVAS_HEIGHT) {
            image::imageops::crop_imm(frame, r.x, r.y, r.width, r.height).to_image()
        } else {
            let canvas =
                image::imageops::resize(frame, CANVAS_WIDTH, CANVAS_HEIGHT, FilterType::Triangle);
            image::imageops::crop_imm(&canvas, r.x, r.y, r.width, r.height).to_image()
        };
        MotionSample(pixels)
    }

    /// Mean per-pixel sum of absolute channel differences
    ///
    /// Returns `None` when the samples do not have the same dimensions.
    pub fn compare(previous: &MotionSample, current: &MotionSample) -> Option<f64> {
        if previous.dimensions() != current.dimensions() {
            return None;
        }

        let count = u64::from(current.0.width()) * u64::from(current.0.height());
        if count == 0 {
            return None;
        }

        let total: u64 = previous
            .0
            .pixels()
            .zip(current.0.pixels())
            .map(|(a, b)| {
                (0..3)
                    .map(|c| u64::from(a.0[c].abs_diff(b.0[c])))
                    .sum::<u64>()
            })
            .sum();

        Some(total as f64 / count as f64)
    }

    /// True iff the difference is strictly above the threshold
    pub fn is_motion(avg_diff: f64, threshold: f64) -> bool {
        avg_diff > threshold
    }

    /// Run one evaluation cycle
    ///
    /// A missing frame is reported as no motion. The first frame after a
    /// reset only seeds the previous sample.
    pub fn evaluate(&mut self, frame: Option<&RgbaImage>) -> bool {
        let Some(frame) = frame else {
            return false;
        };

        let current = self.sample(frame);
        let avg_diff = self
            .previous
            .as_ref()
            .and_then(|previous| Self::compare(previous, &current));
        self.previous = Some(current);

        match avg_diff {
            Some(avg) => {
                debug!("Gesture sample difference {:.2}", avg);
                Self::is_motion(avg, self.threshold)
            }
            None => false,
        }
    }

    /// Forget the previous sample
    pub fn reset(&mut self) {
        self.previous = None;
    }
}
