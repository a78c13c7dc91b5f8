// THEORY:
// The differencer is the first stage of the pipeline and the only one that sees
// two frames at once. It measures how far each pixel's intensity moved between
// the start and end snapshots and nothing else: no smoothing, no history.
//
// The subtraction is done in `i16` so that `10 - 200` is `-190` rather than a
// modulo-256 wrap. Both operands are already in 0..=255, so the absolute value
// always fits back into a byte.

use crate::core_modules::frame::{Frame, Intensity};
use crate::core_modules::grid::Dimensions;
use crate::error::{MotionError, Result};
use image::GrayImage;
use std::ops::Range;

pub type Delta = u8;

/// Per-pixel absolute intensity change between two frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifferenceImage {
    dimensions: Dimensions,
    samples: Vec<Delta>,
}

impl DifferenceImage {
    pub(crate) fn from_samples(dimensions: Dimensions, samples: Vec<Delta>) -> Self {
        debug_assert_eq!(samples.len(), dimensions.len());
        Self { dimensions, samples }
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn samples(&self) -> &[Delta] {
        &self.samples
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Delta> {
        self.dimensions
            .checked_index(x as i64, y as i64)
            .map(|index| self.samples[index])
    }

    /// Largest change anywhere in the image.
    pub fn max_delta(&self) -> Delta {
        self.samples.iter().copied().max().unwrap_or(0)
    }

    pub fn is_zero(&self) -> bool {
        self.samples.iter().all(|&delta| delta == 0)
    }

    pub fn to_luma_image(&self) -> GrayImage {
        GrayImage::from_fn(self.dimensions.width, self.dimensions.height, |x, y| {
            image::Luma([self.samples[self.dimensions.index(x, y)]])
        })
    }
}

/// `|end - start|` for every pixel of two equally sized frames.
pub fn compute_difference(start: &Frame, end: &Frame) -> Result<DifferenceImage> {
    ensure_same_dimensions(start, end)?;
    let samples = difference_rows(start, end, 0..start.height() as usize);
    Ok(DifferenceImage::from_samples(start.dimensions(), samples))
}

pub(crate) fn ensure_same_dimensions(start: &Frame, end: &Frame) -> Result<()> {
    if start.dimensions() != end.dimensions() {
        return Err(MotionError::DimensionMismatch {
            start: start.dimensions(),
            end: end.dimensions(),
        });
    }
    Ok(())
}

/// Difference of one band of rows. Both frames must already share dimensions.
pub(crate) fn difference_rows(start: &Frame, end: &Frame, rows: Range<usize>) -> Vec<Delta> {
    let span = start.dimensions().sample_range(&rows);
    start.samples()[span.clone()]
        .iter()
        .zip(&end.samples()[span])
        .map(|(&before, &after)| absolute_delta(before, after))
        .collect()
}

fn absolute_delta(before: Intensity, after: Intensity) -> Delta {
    (after as i16 - before as i16).unsigned_abs() as Delta
}
