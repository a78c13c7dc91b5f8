// THEORY:
// The thresholder turns "how much did it change" into "did it move". The rule
// is a strict comparison: a pixel whose delta equals the cutoff is background.
// This mirrors the classic `THRESH_BINARY` behaviour and makes cutoff 0 mean
// "any change at all" and cutoff 255 mean "nothing can ever move".

use crate::core_modules::difference::DifferenceImage;
use crate::core_modules::mask::{BinaryMask, to_sample};
use crate::error::{MotionError, Result};
use std::fmt;
use std::ops::Range;

/// A validated intensity cutoff in `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Threshold(u8);

impl Threshold {
    /// The detection cutoff used when nothing else is configured.
    pub const DEFAULT: Threshold = Threshold(30);

    pub fn new(cutoff: i64) -> Result<Self> {
        u8::try_from(cutoff)
            .map(Threshold)
            .map_err(|_| MotionError::InvalidThreshold(cutoff))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether a given delta counts as motion.
    pub fn is_motion(self, delta: u8) -> bool {
        delta > self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u8> for Threshold {
    fn from(cutoff: u8) -> Self {
        Threshold(cutoff)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Binarizes a difference image: 255 where `delta > cutoff`, else 0.
pub fn apply_threshold(diff: &DifferenceImage, cutoff: i64) -> Result<BinaryMask> {
    let threshold = Threshold::new(cutoff)?;
    Ok(threshold_image(diff, threshold))
}

/// Same as [`apply_threshold`] with an already validated cutoff.
pub fn threshold_image(diff: &DifferenceImage, threshold: Threshold) -> BinaryMask {
    let samples = threshold_rows(diff, threshold, 0..diff.dimensions().height as usize);
    BinaryMask::from_samples(diff.dimensions(), samples)
}

pub(crate) fn threshold_rows(diff: &DifferenceImage, threshold: Threshold, rows: Range<usize>) -> Vec<u8> {
    let span = diff.dimensions().sample_range(&rows);
    diff.samples()[span]
        .iter()
        .map(|&delta| to_sample(threshold.is_motion(delta)))
        .collect()
}
