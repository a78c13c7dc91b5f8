// THEORY:
// The `BinaryMask` is the engine's answer: for each pixel, did it move or not?
// It is stored as bytes that are exactly `FOREGROUND` (255) or `BACKGROUND` (0)
// so it can be handed straight to an image encoder or display layer, but every
// query treats it as a boolean grid.

use crate::core_modules::grid::Dimensions;
use image::GrayImage;

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// A grid of motion flags, each sample exactly 0 or 255.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    dimensions: Dimensions,
    samples: Vec<u8>,
}

impl BinaryMask {
    pub(crate) fn from_samples(dimensions: Dimensions, samples: Vec<u8>) -> Self {
        debug_assert_eq!(samples.len(), dimensions.len());
        debug_assert!(samples.iter().all(|&s| s == FOREGROUND || s == BACKGROUND));
        Self { dimensions, samples }
    }

    /// Builds a mask from boolean flags, `true` meaning foreground.
    /// Returns `None` when the flag count does not match the dimensions.
    pub fn from_flags(width: u32, height: u32, flags: &[bool]) -> Option<Self> {
        let dimensions = Dimensions::new(width, height);
        (flags.len() == dimensions.len()).then(|| {
            let samples = flags.iter().map(|&flag| to_sample(flag)).collect();
            Self { dimensions, samples }
        })
    }

    /// Builds a mask from a predicate over pixel coordinates.
    pub fn from_fn(width: u32, height: u32, mut is_foreground: impl FnMut(u32, u32) -> bool) -> Self {
        let dimensions = Dimensions::new(width, height);
        let samples = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| to_sample(is_foreground(x, y)))
            .collect();
        Self { dimensions, samples }
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.dimensions
            .checked_index(x as i64, y as i64)
            .is_some_and(|index| self.samples[index] == FOREGROUND)
    }

    /// Foreground test for a signed coordinate; `None` when off the grid.
    pub(crate) fn foreground_at(&self, x: i64, y: i64) -> Option<bool> {
        self.dimensions
            .checked_index(x, y)
            .map(|index| self.samples[index] == FOREGROUND)
    }

    pub fn foreground_count(&self) -> usize {
        self.samples.iter().filter(|&&s| s == FOREGROUND).count()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.iter().all(|&s| s == BACKGROUND)
    }

    /// Percentage of pixels flagged as moving, in `[0, 100]`.
    pub fn motion_ratio(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.foreground_count() as f64 / self.samples.len() as f64 * 100.0
    }

    /// True when every foreground pixel of `self` is also foreground in `other`.
    /// Masks of different dimensions are never subsets of each other.
    pub fn is_subset_of(&self, other: &BinaryMask) -> bool {
        self.dimensions == other.dimensions
            && self
                .samples
                .iter()
                .zip(&other.samples)
                .all(|(&mine, &theirs)| mine == BACKGROUND || theirs == FOREGROUND)
    }

    pub fn to_luma_image(&self) -> GrayImage {
        GrayImage::from_fn(self.dimensions.width, self.dimensions.height, |x, y| {
            image::Luma([self.samples[self.dimensions.index(x, y)]])
        })
    }
}

pub(crate) fn to_sample(foreground: bool) -> u8 {
    if foreground { FOREGROUND } else { BACKGROUND }
}
