//! # Frame buffers
//!
//! 8-bit frames as they come out of a decoder, and the higher precision representation the
//! background model accumulates into.

use crate::prelude::v1::*;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::filter::box_filter;
use imageproc::rect::Rect;

/// BT.601 luma in 14-bit fixed point, rounded to nearest.
fn luma([r, g, b]: [u8; 3]) -> u8 {
    ((r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + 8192) >> 14) as u8
}

/// Spatial size and channel depth of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    pub channels: usize,
}

impl FrameLayout {
    /// Number of pixels in the frame.
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Number of samples in the frame (`area * channels`).
    pub fn samples(&self) -> usize {
        self.area() * self.channels
    }
}

/// Single video frame.
///
/// Grayscale streams stay single-channel, everything else is processed as 8-bit RGB.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl From<DynamicImage> for Frame {
    fn from(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => Self::Gray(gray),
            other => Self::Rgb(other.into_rgb8()),
        }
    }
}

impl From<Frame> for DynamicImage {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Gray(gray) => DynamicImage::ImageLuma8(gray),
            Frame::Rgb(rgb) => DynamicImage::ImageRgb8(rgb),
        }
    }
}

impl From<GrayImage> for Frame {
    fn from(gray: GrayImage) -> Self {
        Self::Gray(gray)
    }
}

impl From<RgbImage> for Frame {
    fn from(rgb: RgbImage) -> Self {
        Self::Rgb(rgb)
    }
}

impl Frame {
    /// Build a frame out of raw interleaved samples.
    ///
    /// Only 1 and 3 channel layouts are supported.
    pub fn from_raw(layout: FrameLayout, data: Vec<u8>) -> Result<Self> {
        let FrameLayout {
            width,
            height,
            channels,
        } = layout;

        let frame = match channels {
            1 => GrayImage::from_raw(width, height, data).map(Self::Gray),
            3 => RgbImage::from_raw(width, height, data).map(Self::Rgb),
            _ => return Err(anyhow!("Unsupported channel count {channels}")),
        };

        frame.ok_or_else(|| anyhow!("Sample buffer does not fit a {width}x{height} frame"))
    }

    /// Get width and height of the frame.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Gray(img) => img.dimensions(),
            Self::Rgb(img) => img.dimensions(),
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            Self::Gray(_) => 1,
            Self::Rgb(_) => 3,
        }
    }

    pub fn layout(&self) -> FrameLayout {
        let (width, height) = self.dimensions();
        FrameLayout {
            width,
            height,
            channels: self.channels(),
        }
    }

    /// Get number of pixels in the frame.
    ///
    /// This is the same as `width * height`
    pub fn area(&self) -> usize {
        self.layout().area()
    }

    /// Get the samples in row-major, channel-interleaved order.
    pub fn as_raw(&self) -> &[u8] {
        match self {
            Self::Gray(img) => img.as_raw(),
            Self::Rgb(img) => img.as_raw(),
        }
    }

    /// Box blur every channel.
    ///
    /// The averaging window is `(2 * radius + 1)` pixels wide in both directions. A radius of 0
    /// returns an unmodified copy.
    pub fn smooth(&self, radius: u32) -> Self {
        if radius == 0 {
            return self.clone();
        }

        match self {
            Self::Gray(img) => Self::Gray(box_filter(img, radius, radius)),
            Self::Rgb(img) => {
                let (w, h) = img.dimensions();

                let planes = (0..3)
                    .map(|c| {
                        let plane = GrayImage::from_fn(w, h, |x, y| Luma([img.get_pixel(x, y)[c]]));
                        box_filter(&plane, radius, radius)
                    })
                    .collect::<Vec<_>>();

                Self::Rgb(RgbImage::from_fn(w, h, |x, y| {
                    Rgb([
                        planes[0].get_pixel(x, y)[0],
                        planes[1].get_pixel(x, y)[0],
                        planes[2].get_pixel(x, y)[0],
                    ])
                }))
            }
        }
    }

    /// Per-sample absolute difference between two frames of the same layout.
    pub fn abs_diff(&self, other: &Self) -> Result<Self> {
        let layout = self.layout();

        ensure!(
            layout == other.layout(),
            "Frame layout mismatch: {:?} vs {:?}",
            layout,
            other.layout()
        );

        let data = self
            .as_raw()
            .iter()
            .zip(other.as_raw())
            .map(|(&a, &b)| a.abs_diff(b))
            .collect();

        Self::from_raw(layout, data)
    }

    /// Reduce the frame to a single intensity channel, using BT.601 weights.
    pub fn to_luma(&self) -> GrayImage {
        match self {
            Self::Gray(img) => img.clone(),
            Self::Rgb(img) => GrayImage::from_fn(img.width(), img.height(), |x, y| {
                Luma([luma(img.get_pixel(x, y).0)])
            }),
        }
    }

    /// Draw the outline of a rectangle.
    ///
    /// The outline runs through the corners `(x, y)` and `(x + width, y + height)`, with thicker
    /// lines centred on that path. Anything falling outside the frame is clipped. On grayscale
    /// frames the color is reduced to its luma.
    pub fn draw_rectangle(&mut self, rect: &Rectangle, color: [u8; 3], thickness: u32) {
        if thickness == 0 {
            return;
        }

        let t = thickness as i32;

        for d in -(t / 2)..=(t - 1) / 2 {
            let width = rect.width as i32 + 1 - 2 * d;
            let height = rect.height as i32 + 1 - 2 * d;

            if width <= 0 || height <= 0 {
                break;
            }

            let r = Rect::at(rect.x as i32 + d, rect.y as i32 + d)
                .of_size(width as u32, height as u32);

            match self {
                Self::Gray(img) => draw_hollow_rect_mut(img, r, Luma([luma(color)])),
                Self::Rgb(img) => draw_hollow_rect_mut(img, r, Rgb(color)),
            }
        }
    }
}

/// Floating point frame.
///
/// Same layout as [`Frame`], but with `f32` samples, so that repeated blending does not compound
/// rounding errors.
#[derive(Clone, Debug, PartialEq)]
pub struct FloatFrame {
    layout: FrameLayout,
    data: Vec<f32>,
}

impl From<&Frame> for FloatFrame {
    fn from(frame: &Frame) -> Self {
        Self::from_frame(frame)
    }
}

impl FloatFrame {
    /// Widen every sample of an 8-bit frame.
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            layout: frame.layout(),
            data: frame.as_raw().iter().map(|&v| v as f32).collect(),
        }
    }

    pub fn from_raw(layout: FrameLayout, data: Vec<f32>) -> Result<Self> {
        ensure!(
            matches!(layout.channels, 1 | 3),
            "Unsupported channel count {}",
            layout.channels
        );
        ensure!(
            data.len() == layout.samples(),
            "Expected {} samples, got {}",
            layout.samples(),
            data.len()
        );
        Ok(Self { layout, data })
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Overwrite the samples with the ones of `frame`.
    pub fn assign(&mut self, frame: &Frame) -> Result<()> {
        self.check_layout(frame)?;

        self.data
            .iter_mut()
            .zip(frame.as_raw())
            .for_each(|(d, &s)| *d = s as f32);

        Ok(())
    }

    /// Blend `frame` in with weight `alpha`.
    ///
    /// Every sample becomes `alpha * frame + (1 - alpha) * self`.
    pub fn blend(&mut self, frame: &Frame, alpha: f32) -> Result<()> {
        self.check_layout(frame)?;

        self.data
            .iter_mut()
            .zip(frame.as_raw())
            .for_each(|(d, &s)| *d = alpha * s as f32 + (1.0 - alpha) * *d);

        Ok(())
    }

    /// Convert back to an 8-bit frame.
    ///
    /// Takes the absolute value of every sample, rounds it to the nearest integer (ties to even)
    /// and saturates to `0..=255`.
    pub fn to_frame(&self) -> Result<Frame> {
        let data = self
            .data
            .iter()
            .map(|v| v.abs().round_ties_even().min(255.0) as u8)
            .collect();

        Frame::from_raw(self.layout, data)
    }

    fn check_layout(&self, frame: &Frame) -> Result<()> {
        ensure!(
            self.layout == frame.layout(),
            "Frame layout changed from {:?} to {:?}",
            self.layout,
            frame.layout()
        );
        Ok(())
    }
}
