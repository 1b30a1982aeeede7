//! # Changed region extraction

use crate::prelude::v1::*;
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate_mut, erode_mut};
use imageproc::point::Point;

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Rectangle {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// First column past the right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// First row past the bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Check whether `other` lies fully within this rectangle.
    pub fn contains(&self, other: &Self) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Minimal rectangle containing every point.
    ///
    /// Points are pixel positions, so a single point yields a 1x1 rectangle.
    pub fn bounding(points: &[Point<i32>]) -> Option<Self> {
        let first = points.first()?;

        let (min_x, min_y, max_x, max_y) = points.iter().fold(
            (first.x, first.y, first.x, first.y),
            |(min_x, min_y, max_x, max_y), p| {
                (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
            },
        );

        Some(Self {
            x: min_x.max(0) as u32,
            y: min_y.max(0) as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        })
    }
}

/// Traced boundary of a connected foreground region.
#[derive(Clone, Debug)]
pub struct Contour {
    /// Boundary vertices. Straight runs are collapsed to their end points.
    pub points: Vec<Point<i32>>,
    /// Index of the enclosing contour.
    pub parent: Option<usize>,
    /// Whether this is the border of a hole inside a region.
    pub is_hole: bool,
}

impl Contour {
    pub fn bounding_rect(&self) -> Option<Rectangle> {
        Rectangle::bounding(&self.points)
    }
}

/// Drop every vertex that continues a straight horizontal, vertical or diagonal run.
fn compress_chain(points: Vec<Point<i32>>) -> Vec<Point<i32>> {
    let n = points.len();

    if n < 3 {
        return points;
    }

    let step = |a: Point<i32>, b: Point<i32>| (b.x - a.x, b.y - a.y);

    let compressed = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, points[i]) != step(points[i], next)
        })
        .map(|i| points[i])
        .collect::<Vec<_>>();

    if compressed.is_empty() {
        points
    } else {
        compressed
    }
}

/// Morphological region extractor.
///
/// The mask is first dilated, so that fragments of the same object merge together, then eroded
/// by a smaller amount to drop the noise. Every square kernel pass grows (or shrinks) regions by
/// one pixel, so `N` passes of a 3x3 kernel are performed as a single L∞ operation of radius `N`.
#[derive(Clone, Copy, Debug)]
pub struct RegionExtractor {
    dilate_passes: u8,
    erode_passes: u8,
}

impl Default for RegionExtractor {
    fn default() -> Self {
        Self {
            dilate_passes: 15,
            erode_passes: 10,
        }
    }
}

impl RegionExtractor {
    pub fn new(dilate_passes: u8, erode_passes: u8) -> Self {
        Self {
            dilate_passes,
            erode_passes,
        }
    }

    /// Dilate, then erode the mask in place.
    pub fn clean(&self, mask: &mut ChangeMask) {
        let image = mask.image_mut();

        if self.dilate_passes > 0 {
            dilate_mut(image, Norm::LInf, self.dilate_passes);
        }

        if self.erode_passes > 0 {
            erode_mut(image, Norm::LInf, self.erode_passes);
        }
    }

    /// Trace every contour in the mask, including nested ones.
    ///
    /// Everything outside the mask counts as background, so regions touching the frame edge are
    /// closed off by it.
    pub fn contours(mask: &ChangeMask) -> Vec<Contour> {
        let image = mask.image();
        let (w, h) = image.dimensions();

        // The tracer never starts a border in the first column, so give it a blank one.
        let padded = GrayImage::from_fn(w + 2, h + 2, |x, y| {
            if (1..=w).contains(&x) && (1..=h).contains(&y) {
                *image.get_pixel(x - 1, y - 1)
            } else {
                Luma([0])
            }
        });

        find_contours::<i32>(&padded)
            .into_iter()
            .map(|c| Contour {
                points: compress_chain(
                    c.points
                        .into_iter()
                        .map(|p| Point::new(p.x - 1, p.y - 1))
                        .collect(),
                ),
                parent: c.parent,
                is_hole: c.border_type == BorderType::Hole,
            })
            .collect()
    }

    /// Clean up the mask and bound every contour in it.
    ///
    /// There is one rectangle per contour. Parent and child contours of the same region yield
    /// separate, possibly overlapping rectangles.
    pub fn extract(&self, mask: &mut ChangeMask) -> Vec<Rectangle> {
        self.clean(mask);

        Self::contours(mask)
            .iter()
            .filter_map(Contour::bounding_rect)
            .collect()
    }
}
