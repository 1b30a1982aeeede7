//! # Pipeline configuration

use crate::prelude::v1::*;

/// Tunables of the motion detection pipeline.
///
/// The defaults are tuned for fixed-camera traffic footage.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MotionConfig {
    /// Box blur radius applied to every frame before anything else. 0 disables smoothing.
    pub blur_radius: u32,
    /// Background adaptation rate.
    pub alpha: f32,
    /// Intensity difference (0-255) a pixel has to exceed to count as changed.
    pub diff_threshold: u8,
    /// Motion percentage above which the background is considered stale and is reset.
    pub reset_percentage: f64,
    /// Motion percentage above which a frame counts as having motion.
    pub motion_percentage: f64,
    /// Number of 3x3 dilation passes over the change mask.
    pub dilate_passes: u8,
    /// Number of 3x3 erosion passes over the change mask.
    pub erode_passes: u8,
    /// RGB color of the drawn rectangles.
    pub rect_color: [u8; 3],
    /// Outline thickness of the drawn rectangles.
    pub rect_thickness: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            // 9x9 box with replicated borders, closest centred match for an 8x8 blur.
            blur_radius: 4,
            alpha: 0.03,
            diff_threshold: 25,
            reset_percentage: 25.0,
            motion_percentage: 0.75,
            dilate_passes: 15,
            erode_passes: 10,
            rect_color: [0, 255, 0],
            rect_thickness: 2,
        }
    }
}

impl MotionConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.alpha > 0.0 && self.alpha <= 1.0,
            "alpha must be within (0, 1], got {}",
            self.alpha
        );

        for (name, value) in [
            ("reset_percentage", self.reset_percentage),
            ("motion_percentage", self.motion_percentage),
        ] {
            ensure!(
                (0.0..=100.0).contains(&value),
                "{name} must be within [0, 100], got {value}"
            );
        }

        ensure!(self.rect_thickness > 0, "rect_thickness must be positive");

        Ok(())
    }
}
