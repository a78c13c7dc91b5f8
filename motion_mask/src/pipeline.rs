// THEORY:
// The `pipeline` module is the top-level API of the engine. It strings the three
// stages together in their only valid order:
//
//   Frame, Frame --(differencer)--> DifferenceImage --(thresholder)--> BinaryMask
//                                                   --(cleaner, optional)--> BinaryMask
//
// Each stage is a pure function in `core_modules`; this layer adds configuration,
// a report that keeps the intermediate difference image for display, and the
// logging the stages themselves never do.

use crate::core_modules::difference::compute_difference;
use crate::core_modules::morphology::open_with_border;
use crate::core_modules::threshold::threshold_image;
use crate::error::Result;
use log::{debug, warn};
use std::time::Instant;

// Re-export key data structures for the public API.
pub use crate::core_modules::difference::DifferenceImage;
pub use crate::core_modules::frame::Frame;
pub use crate::core_modules::mask::BinaryMask;
pub use crate::core_modules::morphology::{BorderPolicy, StructuringElement};
pub use crate::core_modules::threshold::Threshold;

/// Configuration for the MotionPipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Pixels whose delta is strictly greater than this are flagged as moving.
    pub threshold: Threshold,
    /// Run a morphological opening over the thresholded mask.
    pub denoise: bool,
    /// Neighbourhood used by the opening.
    pub structuring_element: StructuringElement,
    /// What the opening assumes lies beyond the frame edge.
    pub border: BorderPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold: Threshold::default(),
            denoise: false,
            structuring_element: StructuringElement::default(),
            border: BorderPolicy::default(),
        }
    }
}

/// Everything the pipeline produced for one pair of frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionReport {
    pub difference: DifferenceImage,
    pub mask: BinaryMask,
}

impl MotionReport {
    /// Percentage of pixels flagged as moving.
    pub fn motion_ratio(&self) -> f64 {
        self.mask.motion_ratio()
    }

    /// True when the two frames were identical, which always yields an empty mask.
    pub fn frame_delta_is_zero(&self) -> bool {
        self.difference.is_zero()
    }
}

/// Synchronous frame-differencing motion detector.
#[derive(Debug, Clone, Default)]
pub struct MotionPipeline {
    config: PipelineConfig,
}

impl MotionPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn process(&self, start: &Frame, end: &Frame) -> Result<MotionReport> {
        let started = Instant::now();

        // Stage 1: Differencing
        let difference = compute_difference(start, end)?;
        if difference.is_zero() {
            warn!("start and end frames are identical; the motion mask will be empty");
        }

        // Stage 2: Thresholding
        let mut mask = threshold_image(&difference, self.config.threshold);
        debug!(
            "thresholded {} difference at {}: {} foreground pixels",
            difference.dimensions(),
            self.config.threshold,
            mask.foreground_count()
        );

        // Stage 3: Optional cleanup
        if self.config.denoise {
            mask = open_with_border(&mask, &self.config.structuring_element, self.config.border);
            debug!("opening left {} foreground pixels", mask.foreground_count());
        }

        debug!("processed frame pair in {:?}", started.elapsed());
        Ok(MotionReport { difference, mask })
    }

    /// Runs the pipeline and keeps only the final mask.
    pub fn detect(&self, start: &Frame, end: &Frame) -> Result<BinaryMask> {
        self.process(start, end).map(|report| report.mask)
    }
}

/// One-shot motion detection with the default structuring element and border.
/// Calls the stages directly and never logs; the identical-frame warning is
/// left to the caller.
pub fn detect_motion(start: &Frame, end: &Frame, cutoff: i64, denoise: bool) -> Result<BinaryMask> {
    let threshold = Threshold::new(cutoff)?;
    let difference = compute_difference(start, end)?;
    let mask = threshold_image(&difference, threshold);
    if !denoise {
        return Ok(mask);
    }
    Ok(open_with_border(&mask, &StructuringElement::default(), BorderPolicy::default()))
}
