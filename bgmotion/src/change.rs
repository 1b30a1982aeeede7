//! # Change detection

use crate::prelude::v1::*;
use image::GrayImage;
use imageproc::contrast::{threshold, ThresholdType};

/// Compute the share of changed pixels, in percent.
///
/// # Arguments
///
/// * `changed` - number of changed pixels.
/// * `total` - number of pixels in the frame. Must not be zero.
pub fn motion_percentage(changed: usize, total: usize) -> Result<f64> {
    ensure!(total > 0, "Cannot compute motion over a zero-area frame");
    Ok(100.0 * changed as f64 / total as f64)
}

/// Binary change mask.
///
/// Every pixel is either 0 (unchanged) or 255 (changed).
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeMask(GrayImage);

impl ChangeMask {
    /// Wrap a binary image. Any nonzero sample counts as changed.
    pub fn from_image(image: GrayImage) -> Self {
        Self(image)
    }

    pub fn image(&self) -> &GrayImage {
        &self.0
    }

    pub(crate) fn image_mut(&mut self) -> &mut GrayImage {
        &mut self.0
    }

    pub fn into_image(self) -> GrayImage {
        self.0
    }

    pub fn changed_pixels(&self) -> usize {
        self.0.as_raw().iter().filter(|&&v| v != 0).count()
    }

    pub fn motion_percentage(&self) -> Result<f64> {
        let (w, h) = self.0.dimensions();
        motion_percentage(self.changed_pixels(), w as usize * h as usize)
    }
}

/// Thresholded frame differencing.
#[derive(Clone, Copy, Debug)]
pub struct ChangeDetector {
    threshold: u8,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self { threshold: 25 }
    }
}

impl ChangeDetector {
    /// Create a new detector.
    ///
    /// # Arguments
    ///
    /// * `threshold` - intensity difference a pixel has to exceed to be marked as changed.
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    /// Compare a frame against the background estimate.
    ///
    /// The absolute difference is reduced to a single intensity channel, and thresholded.
    pub fn detect(&self, frame: &Frame, estimate: &Frame) -> Result<ChangeMask> {
        let diff = frame.abs_diff(estimate)?.to_luma();
        Ok(ChangeMask(threshold(&diff, self.threshold, ThresholdType::Binary)))
    }
}
